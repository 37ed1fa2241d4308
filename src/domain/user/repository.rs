//! Identity store trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::claim::Claim;
use super::entity::{User, UserId};
use crate::domain::DomainError;

/// Storage backend for identities, their claims and role memberships
///
/// Name and email lookups take normalized keys (see
/// [`normalize_key`](super::normalize_key)). Implementations must reject a
/// second user with the same normalized user name with
/// [`DomainError::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find a user by normalized user name
    async fn find_by_name(&self, normalized_user_name: &str) -> Result<Option<User>, DomainError>;

    /// Find a user by normalized email
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, DomainError>;

    /// Get a user by ID
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Persist a new user
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Stored claims for a user
    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, DomainError>;

    /// Attach a claim to a user
    async fn add_claim(&self, id: &UserId, claim: Claim) -> Result<(), DomainError>;

    /// Role memberships for a user
    async fn get_roles(&self, id: &UserId) -> Result<Vec<String>, DomainError>;

    /// Add a role membership, idempotent
    async fn add_to_role(&self, id: &UserId, role: &str) -> Result<(), DomainError>;

    /// Number of stored users
    async fn count(&self) -> Result<usize, DomainError>;
}
