//! User Token API
//!
//! Registers users against an identity store and exchanges their credentials
//! for signed JWT bearer tokens:
//! - Argon2 password hashing with configurable password rules
//! - In-memory or PostgreSQL identity storage
//! - HS256 tokens carrying each user's stored claims

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::{AppState, UserServiceTrait};
use infrastructure::auth::JwtTokenIssuer;
use infrastructure::storage::{connect, Migrator, PostgresMigrator, StorageType};
use infrastructure::user::{Argon2Hasher, InMemoryIdentityStore, PostgresIdentityStore, UserManager};
use tracing::info;

/// Create the application state from configuration
///
/// Fails when the signing key is unusable or the configured store cannot be reached.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let token_issuer = JwtTokenIssuer::new(config.jwt_security_token.to_issuer_config()?)?;
    let hasher = Arc::new(Argon2Hasher::new());
    let options = config.identity.to_options();

    info!("Storage backend: {:?}", config.storage.backend);

    let user_service: Arc<dyn UserServiceTrait> = match config.storage.backend {
        StorageType::Memory => {
            info!("Using in-memory identity store");
            Arc::new(UserManager::new(
                Arc::new(InMemoryIdentityStore::new()),
                hasher,
                options,
            ))
        }
        StorageType::Postgres => {
            info!("Connecting to PostgreSQL...");
            let pool = connect(&config.storage.postgres).await?;

            let applied = PostgresMigrator::identity(pool.clone()).run().await?;
            info!(applied, "PostgreSQL identity schema ready");

            Arc::new(UserManager::new(
                Arc::new(PostgresIdentityStore::new(pool)),
                hasher,
                options,
            ))
        }
    };

    Ok(AppState::new(user_service, Arc::new(token_issuer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtSecurityTokenConfig;

    #[tokio::test]
    async fn test_create_app_state_in_memory() {
        let config = AppConfig {
            jwt_security_token: JwtSecurityTokenConfig {
                key: "bootstrap-test-key".to_string(),
                issuer: "user-api".to_string(),
                audience: "user-api-clients".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let state = create_app_state(&config).await.unwrap();

        assert_eq!(state.user_service.count().await.unwrap(), 0);
        assert_eq!(state.token_issuer.lifetime(), chrono::Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_create_app_state_rejects_empty_key() {
        let config = AppConfig::default();

        assert!(create_app_state(&config).await.is_err());
    }
}
