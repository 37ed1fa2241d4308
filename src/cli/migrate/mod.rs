//! Migrate command - applies the PostgreSQL identity schema

use anyhow::Context;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::storage::{connect, Migrator, PostgresMigrator};

/// Apply pending migrations against `storage.postgres.url`
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Invalid configuration")?;
    logging::init_logging(&config.logging);

    if config.storage.postgres.url.is_empty() {
        anyhow::bail!("storage.postgres.url is required to run migrations");
    }

    let pool = connect(&config.storage.postgres).await?;
    let migrator = PostgresMigrator::identity(pool);

    let applied = migrator.run().await?;
    let version = migrator.version().await?;

    info!(applied, version = ?version, "Migrations complete");

    Ok(())
}
