//! Database migrations infrastructure

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// Trait for running database migrations
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Runs all pending migrations, returns how many were applied
    async fn run(&self) -> Result<usize, DomainError>;

    /// Returns the current migration version
    async fn version(&self) -> Result<Option<i64>, DomainError>;
}

/// PostgreSQL migrator that tracks applied versions in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
    migrations: Vec<Migration>,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool, migrations: Vec<Migration>) -> Self {
        Self { pool, migrations }
    }

    /// Migrator for the identity schema
    pub fn identity(pool: PgPool) -> Self {
        Self::new(pool, identity_migrations())
    }

    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Applies a single migration inside a transaction. Returns false if it was already applied.
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if applied {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to start transaction: {}", e)))?;

        // Prepared statements accept one command each
        for statement in migration.statements() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    DomainError::storage(format!(
                        "Failed to run migration {}: {}",
                        migration.version, e
                    ))
                })?;
        }

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit migration: {}", e)))?;

        info!(version = migration.version, description = %migration.description, "Applied migration");

        Ok(true)
    }
}

#[async_trait]
impl Migrator for PostgresMigrator {
    async fn run(&self) -> Result<usize, DomainError> {
        let mut applied = 0;

        for migration in &self.migrations {
            if self.run_migration(migration).await? {
                applied += 1;
            }
        }

        Ok(applied)
    }

    async fn version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations WHERE success = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
}

impl Migration {
    pub fn new(version: i64, description: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
        }
    }

    /// The `up` script split into individual statements
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.up
            .split(';')
            .map(str::trim)
            .filter(|statement| !statement.is_empty())
    }
}

/// Schema for users, their claims and role memberships
pub fn identity_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create users table",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                user_name TEXT NOT NULL,
                normalized_user_name TEXT NOT NULL,
                email TEXT NOT NULL,
                normalized_email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_normalized_user_name
                ON users(normalized_user_name);
            CREATE INDEX IF NOT EXISTS idx_users_normalized_email
                ON users(normalized_email);
            "#,
        ),
        Migration::new(
            2,
            "Create user_claims table",
            r#"
            CREATE TABLE IF NOT EXISTS user_claims (
                id BIGSERIAL PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                claim_type TEXT NOT NULL,
                claim_value TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_user_claims_user_id ON user_claims(user_id);
            "#,
        ),
        Migration::new(
            3,
            "Create user_roles table",
            r#"
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role_name TEXT NOT NULL,
                normalized_role_name TEXT NOT NULL,
                PRIMARY KEY (user_id, normalized_role_name)
            );
            "#,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = Migration::new(1, "Test migration", "CREATE TABLE test");

        assert_eq!(migration.version, 1);
        assert_eq!(migration.description, "Test migration");
        assert_eq!(migration.up, "CREATE TABLE test");
    }

    #[test]
    fn test_statements_split_on_semicolons() {
        let migration = Migration::new(
            1,
            "Two statements",
            "CREATE TABLE a (id INT);\n  CREATE INDEX idx_a ON a(id);\n",
        );

        let statements: Vec<&str> = migration.statements().collect();
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE INDEX idx_a ON a(id)"]
        );
    }

    #[test]
    fn test_identity_migrations_run_one_command_per_statement() {
        let migrations = identity_migrations();

        let counts: Vec<usize> = migrations.iter().map(|m| m.statements().count()).collect();
        assert_eq!(counts, vec![3, 2, 1]);

        for migration in &migrations {
            for statement in migration.statements() {
                assert!(!statement.contains(';'));
                assert!(statement.starts_with("CREATE"));
            }
        }
    }

    #[test]
    fn test_identity_migrations_order() {
        let migrations = identity_migrations();

        assert_eq!(migrations.len(), 3);

        for pair in migrations.windows(2) {
            assert!(
                pair[1].version > pair[0].version,
                "Migrations should be in ascending order"
            );
        }
    }

    #[test]
    fn test_identity_migrations_create_unique_user_name() {
        let migrations = identity_migrations();

        assert!(migrations[0].up.contains("CREATE UNIQUE INDEX"));
        assert!(migrations[0].up.contains("normalized_user_name"));

        for migration in migrations {
            assert!(!migration.description.is_empty());
            assert!(!migration.up.trim().is_empty());
        }
    }
}
