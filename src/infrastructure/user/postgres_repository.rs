//! PostgreSQL identity store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::user::{normalize_key, Claim, IdentityStore, User, UserId};
use crate::domain::DomainError;

const USER_COLUMNS: &str = "id, user_name, email, password_hash, created_at";

/// PostgreSQL implementation of IdentityStore
///
/// Expects the schema from [`identity_migrations`](crate::infrastructure::storage::identity_migrations).
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1 LIMIT 1", USER_COLUMNS, column);

        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Build a user from its row plus its claims and roles
    async fn hydrate(&self, row: &PgRow) -> Result<User, DomainError> {
        let id = UserId::from_uuid(column::<Uuid>(row, "id")?);
        let claims = self.load_claims(&id).await?;
        let roles = self.load_roles(&id).await?;

        Ok(User::restore(
            id,
            column(row, "user_name")?,
            column(row, "email")?,
            column(row, "password_hash")?,
            claims,
            roles,
            column::<DateTime<Utc>>(row, "created_at")?,
        ))
    }

    async fn load_claims(&self, id: &UserId) -> Result<Vec<Claim>, DomainError> {
        let rows = sqlx::query(
            "SELECT claim_type, claim_value FROM user_claims WHERE user_id = $1 ORDER BY id",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load claims: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(Claim::new(
                    column::<String>(row, "claim_type")?,
                    column::<String>(row, "claim_value")?,
                ))
            })
            .collect()
    }

    async fn load_roles(&self, id: &UserId) -> Result<Vec<String>, DomainError> {
        sqlx::query_scalar("SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY role_name")
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to load roles: {}", e)))
    }

    async fn ensure_exists(&self, id: &UserId) -> Result<(), DomainError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check user: {}", e)))?;

        if exists {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("User '{}' not found", id)))
        }
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn find_by_name(&self, normalized_user_name: &str) -> Result<Option<User>, DomainError> {
        self.find_one("normalized_user_name", normalized_user_name).await
    }

    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, DomainError> {
        self.find_one("normalized_email", normalized_email).await
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to start transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, user_name, normalized_user_name, email, normalized_email,
                               password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.user_name())
        .bind(user.normalized_user_name())
        .bind(user.email())
        .bind(user.normalized_email())
        .bind(user.password_hash())
        .bind(user.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::conflict(
                format!("User name '{}' already exists", user.user_name()),
            ),
            _ => DomainError::storage(format!("Failed to create user: {}", e)),
        })?;

        for claim in user.claims() {
            sqlx::query(
                "INSERT INTO user_claims (user_id, claim_type, claim_value) VALUES ($1, $2, $3)",
            )
            .bind(user.id().as_uuid())
            .bind(claim.claim_type())
            .bind(claim.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to store claim: {}", e)))?;
        }

        for role in user.roles() {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_name, normalized_role_name) VALUES ($1, $2, $3)",
            )
            .bind(user.id().as_uuid())
            .bind(role)
            .bind(normalize_key(role))
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to store role: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit user: {}", e)))?;

        Ok(user)
    }

    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, DomainError> {
        self.ensure_exists(id).await?;
        self.load_claims(id).await
    }

    async fn add_claim(&self, id: &UserId, claim: Claim) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO user_claims (user_id, claim_type, claim_value) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(claim.claim_type())
            .bind(claim.value())
            .execute(&self.pool)
            .await
            .map_err(|e| map_user_reference_error(e, id, "Failed to add claim"))?;

        Ok(())
    }

    async fn get_roles(&self, id: &UserId) -> Result<Vec<String>, DomainError> {
        self.ensure_exists(id).await?;
        self.load_roles(id).await
    }

    async fn add_to_role(&self, id: &UserId, role: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name, normalized_role_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, normalized_role_name) DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(role)
        .bind(normalize_key(role))
        .execute(&self.pool)
        .await
        .map_err(|e| map_user_reference_error(e, id, "Failed to add role"))?;

        Ok(())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn column<T>(row: &PgRow, name: &str) -> Result<T, DomainError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::storage(format!("Invalid '{}' column: {}", name, e)))
}

fn map_user_reference_error(e: sqlx::Error, id: &UserId, context: &str) -> DomainError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            DomainError::not_found(format!("User '{}' not found", id))
        }
        _ => DomainError::storage(format!("{}: {}", context, e)),
    }
}
