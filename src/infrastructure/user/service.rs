//! User manager - the identity gateway for registration and authentication

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::user::{
    normalize_key, validate_email, validate_password, validate_user_name, AuthenticationError,
    Claim, IdentityError, IdentityStore, PasswordOptions, RegistrationError, User,
};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Registration rules applied by the user manager
#[derive(Debug, Clone, Default)]
pub struct IdentityOptions {
    pub password: PasswordOptions,
    /// Reject a second account with the same email
    pub require_unique_email: bool,
}

/// Identity gateway over a store and a password hasher
pub struct UserManager<S: IdentityStore, H: PasswordHasher> {
    store: Arc<S>,
    hasher: Arc<H>,
    options: IdentityOptions,
    /// Verified against when the login name is unknown
    dummy_hash: OnceCell<String>,
}

const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-users";

impl<S: IdentityStore, H: PasswordHasher + 'static> UserManager<S, H> {
    pub fn new(store: Arc<S>, hasher: Arc<H>, options: IdentityOptions) -> Self {
        Self {
            store,
            hasher,
            options,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Register a new identity
    ///
    /// Every rule violation is collected and returned together as
    /// [`RegistrationError::Rejected`].
    pub async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, RegistrationError> {
        let mut errors = Vec::new();

        if let Err(e) = validate_user_name(user_name) {
            errors.push(e);
        } else if self
            .store
            .find_by_name(&normalize_key(user_name))
            .await?
            .is_some()
        {
            errors.push(IdentityError::duplicate_user_name(user_name));
        }

        if let Err(e) = validate_email(email) {
            errors.push(e);
        } else if self.options.require_unique_email
            && self.store.find_by_email(&normalize_key(email)).await?.is_some()
        {
            errors.push(IdentityError::duplicate_email(email));
        }

        errors.extend(validate_password(password, &self.options.password));

        if !errors.is_empty() {
            debug!(user_name, errors = errors.len(), "Registration rejected");
            return Err(RegistrationError::Rejected(errors));
        }

        let password_hash = self.hash_password(password).await?;
        let user = User::new(user_name, email, password_hash);

        match self.store.create(user).await {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent registration of the same name
            Err(e) if e.is_conflict() => Err(RegistrationError::Rejected(vec![
                IdentityError::duplicate_user_name(user_name),
            ])),
            Err(e) => Err(e.into()),
        }
    }

    /// Authenticate a login name and secret, returning the identity with its stored claims
    pub async fn authenticate(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<(User, Vec<Claim>), AuthenticationError> {
        let Some(user) = self.store.find_by_name(&normalize_key(user_name)).await? else {
            // Unknown names pay for a hash check too
            let dummy_hash = self
                .dummy_hash
                .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))
                .await?;
            self.verify_password(password, dummy_hash).await?;

            return Err(AuthenticationError::NotFound);
        };

        if !self.verify_password(password, user.password_hash()).await? {
            return Err(AuthenticationError::InvalidCredential);
        }

        let claims = self.store.get_claims(user.id()).await?;

        Ok((user, claims))
    }

    /// Find a user by login name
    pub async fn find_by_name(&self, user_name: &str) -> Result<Option<User>, DomainError> {
        self.store.find_by_name(&normalize_key(user_name)).await
    }

    /// Stored claims for a user
    pub async fn get_claims(&self, user: &User) -> Result<Vec<Claim>, DomainError> {
        self.store.get_claims(user.id()).await
    }

    /// Attach a claim to a user
    pub async fn add_claim(&self, user: &User, claim: Claim) -> Result<(), DomainError> {
        self.store.add_claim(user.id(), claim).await
    }

    /// Role memberships for a user
    pub async fn get_roles(&self, user: &User) -> Result<Vec<String>, DomainError> {
        self.store.get_roles(user.id()).await
    }

    /// Add a user to a role
    pub async fn add_to_role(&self, user: &User, role: &str) -> Result<(), DomainError> {
        if role.trim().is_empty() {
            return Err(DomainError::validation("Role name cannot be empty"));
        }

        self.store.add_to_role(user.id(), role).await
    }

    /// Number of registered users
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.store.count().await
    }

    // Argon2 is deliberately slow; keep it off the async workers.

    async fn hash_password(&self, password: &str) -> Result<String, DomainError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DomainError::internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| DomainError::internal(format!("Password verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::MockIdentityStore;
    use crate::infrastructure::user::password::Argon2Hasher;
    use crate::infrastructure::user::repository::InMemoryIdentityStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_manager() -> UserManager<InMemoryIdentityStore, Argon2Hasher> {
        UserManager::new(
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(Argon2Hasher::new()),
            IdentityOptions::default(),
        )
    }

    /// Argon2 hasher that counts how often it is used
    #[derive(Debug, Default)]
    struct CountingHasher {
        inner: Argon2Hasher,
        hashes: AtomicUsize,
        verifications: AtomicUsize,
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, DomainError> {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            self.inner.hash(password)
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(password, hash)
        }
    }

    fn rejected_codes(err: RegistrationError) -> Vec<String> {
        match err {
            RegistrationError::Rejected(errors) => errors.into_iter().map(|e| e.code).collect(),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_user() {
        let manager = create_manager();

        let user = manager
            .register("alice@example.com", "alice@example.com", "P@ssw0rd1")
            .await
            .unwrap();

        assert_eq!(user.user_name(), "alice@example.com");
        assert_ne!(user.password_hash(), "P@ssw0rd1");
        assert_eq!(manager.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_user_name() {
        let manager = create_manager();

        manager
            .register("dup@x.com", "dup@x.com", "Strong1!")
            .await
            .unwrap();

        let err = manager
            .register("dup@x.com", "dup@x.com", "Strong1!")
            .await
            .unwrap_err();

        assert_eq!(rejected_codes(err), vec!["DuplicateUserName"]);
    }

    #[tokio::test]
    async fn test_register_duplicate_is_case_insensitive() {
        let manager = create_manager();

        manager
            .register("dup@x.com", "dup@x.com", "Strong1!")
            .await
            .unwrap();

        let err = manager
            .register("DUP@X.COM", "DUP@X.COM", "Strong1!")
            .await
            .unwrap_err();

        assert_eq!(rejected_codes(err), vec!["DuplicateUserName"]);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_when_required() {
        let manager = UserManager::new(
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(Argon2Hasher::new()),
            IdentityOptions {
                require_unique_email: true,
                ..Default::default()
            },
        );

        manager
            .register("alice", "shared@example.com", "P@ssw0rd1")
            .await
            .unwrap();

        let err = manager
            .register("bob", "shared@example.com", "P@ssw0rd1")
            .await
            .unwrap_err();

        assert_eq!(rejected_codes(err), vec!["DuplicateEmail"]);
    }

    #[tokio::test]
    async fn test_register_collects_every_violation() {
        let manager = create_manager();

        let err = manager
            .register("not valid", "not-an-email", "weak")
            .await
            .unwrap_err();

        assert_eq!(
            rejected_codes(err),
            vec![
                "InvalidUserName",
                "InvalidEmail",
                "PasswordTooShort",
                "PasswordRequiresNonAlphanumeric",
                "PasswordRequiresDigit",
                "PasswordRequiresUpper",
            ]
        );
        assert_eq!(manager.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_store_conflict_maps_to_duplicate() {
        let mut store = MockIdentityStore::new();
        store.expect_find_by_name().returning(|_| Ok(None));
        store
            .expect_create()
            .returning(|_| Err(DomainError::conflict("User name already exists")));

        let manager = UserManager::new(
            Arc::new(store),
            Arc::new(Argon2Hasher::new()),
            IdentityOptions::default(),
        );

        let err = manager
            .register("race@x.com", "race@x.com", "P@ssw0rd1")
            .await
            .unwrap_err();

        assert_eq!(rejected_codes(err), vec!["DuplicateUserName"]);
    }

    #[tokio::test]
    async fn test_authenticate_success_returns_claims() {
        let manager = create_manager();

        let user = manager
            .register("alice@example.com", "alice@example.com", "P@ssw0rd1")
            .await
            .unwrap();
        manager
            .add_claim(&user, Claim::new("department", "finance"))
            .await
            .unwrap();

        let (authenticated, claims) = manager
            .authenticate("alice@example.com", "P@ssw0rd1")
            .await
            .unwrap();

        assert_eq!(authenticated.id(), user.id());
        assert_eq!(claims, vec![Claim::new("department", "finance")]);
    }

    #[tokio::test]
    async fn test_authenticate_is_case_insensitive_on_name() {
        let manager = create_manager();

        manager
            .register("alice@example.com", "alice@example.com", "P@ssw0rd1")
            .await
            .unwrap();

        tokio_test::assert_ok!(manager.authenticate("ALICE@example.com", "P@ssw0rd1").await);
    }

    #[tokio::test]
    async fn test_authenticate_nonexistent_user() {
        let manager = create_manager();

        let err = manager
            .authenticate("nonexistent@x.com", "any")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthenticationError::NotFound));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user_still_verifies_a_hash() {
        let hasher = Arc::new(CountingHasher::default());
        let manager = UserManager::new(
            Arc::new(InMemoryIdentityStore::new()),
            Arc::clone(&hasher),
            IdentityOptions::default(),
        );

        for _ in 0..2 {
            let err = manager
                .authenticate("ghost@example.com", "P@ssw0rd1")
                .await
                .unwrap_err();
            assert!(matches!(err, AuthenticationError::NotFound));
        }

        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 2);
        // The dummy hash is computed once and reused
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let manager = create_manager();

        manager
            .register("user@x.com", "user@x.com", "P@ssw0rd1")
            .await
            .unwrap();

        let err = manager
            .authenticate("user@x.com", "wrongpass")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthenticationError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_authenticate_store_failure() {
        let mut store = MockIdentityStore::new();
        store
            .expect_find_by_name()
            .returning(|_| Err(DomainError::storage("connection refused")));

        let manager = UserManager::new(
            Arc::new(store),
            Arc::new(Argon2Hasher::new()),
            IdentityOptions::default(),
        );

        let err = manager.authenticate("alice", "P@ssw0rd1").await.unwrap_err();

        assert!(matches!(err, AuthenticationError::Store(_)));
        assert!(!err.is_credential_failure());
    }

    #[tokio::test]
    async fn test_roles() {
        let manager = create_manager();

        let user = manager
            .register("alice", "alice@example.com", "P@ssw0rd1")
            .await
            .unwrap();

        manager.add_to_role(&user, "Admin").await.unwrap();
        tokio_test::assert_err!(manager.add_to_role(&user, "  ").await);

        assert_eq!(manager.get_roles(&user).await.unwrap(), vec!["Admin".to_string()]);
    }
}
