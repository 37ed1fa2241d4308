//! Application state for shared services

use std::sync::Arc;

use crate::domain::user::{AuthenticationError, Claim, IdentityStore, RegistrationError, User};
use crate::domain::DomainError;
use crate::infrastructure::auth::TokenIssuer;
use crate::infrastructure::user::{PasswordHasher, UserManager};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServiceTrait>,
    pub token_issuer: Arc<dyn TokenIssuer>,
}

/// Identity operations needed by the HTTP layer
#[async_trait::async_trait]
pub trait UserServiceTrait: Send + Sync {
    async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, RegistrationError>;

    async fn authenticate(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<(User, Vec<Claim>), AuthenticationError>;

    /// Number of registered users, used by readiness checks
    async fn count(&self) -> Result<usize, DomainError>;
}

#[async_trait::async_trait]
impl<S, H> UserServiceTrait for UserManager<S, H>
where
    S: IdentityStore + 'static,
    H: PasswordHasher + 'static,
{
    async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, RegistrationError> {
        UserManager::register(self, user_name, email, password).await
    }

    async fn authenticate(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<(User, Vec<Claim>), AuthenticationError> {
        UserManager::authenticate(self, user_name, password).await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        UserManager::count(self).await
    }
}

impl AppState {
    /// Create new application state with provided services
    pub fn new(user_service: Arc<dyn UserServiceTrait>, token_issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            user_service,
            token_issuer,
        }
    }
}
