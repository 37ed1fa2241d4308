//! In-memory identity store implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::user::{Claim, IdentityStore, User, UserId};
use crate::domain::DomainError;

/// Users and the name index, guarded by a single lock
#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    /// Normalized user name -> user ID
    name_index: HashMap<String, UserId>,
}

impl Inner {
    fn user_mut(&mut self, id: &UserId) -> Result<&mut User, DomainError> {
        self.users
            .get_mut(id)
            .ok_or_else(|| InMemoryIdentityStore::missing(id))
    }
}

/// In-memory implementation of IdentityStore, used for tests and the
/// `memory` storage backend
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryIdentityStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial users. Later duplicates of a user name are dropped.
    pub fn with_users(users: Vec<User>) -> Self {
        let mut inner = Inner::default();

        for user in users {
            let key = user.normalized_user_name();

            if inner.name_index.contains_key(&key) {
                continue;
            }

            inner.name_index.insert(key, *user.id());
            inner.users.insert(*user.id(), user);
        }

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    fn missing(id: &UserId) -> DomainError {
        DomainError::not_found(format!("User '{}' not found", id))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_name(&self, normalized_user_name: &str) -> Result<Option<User>, DomainError> {
        let inner = self.inner.read().await;

        Ok(inner
            .name_index
            .get(normalized_user_name)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, DomainError> {
        let inner = self.inner.read().await;

        Ok(inner
            .users
            .values()
            .find(|u| u.normalized_email() == normalized_email)
            .cloned())
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut inner = self.inner.write().await;

        let key = user.normalized_user_name();

        if inner.users.contains_key(user.id()) {
            return Err(DomainError::conflict(format!(
                "User with ID '{}' already exists",
                user.id()
            )));
        }

        if inner.name_index.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "User name '{}' already exists",
                user.user_name()
            )));
        }

        inner.name_index.insert(key, *user.id());
        inner.users.insert(*user.id(), user.clone());

        Ok(user)
    }

    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, DomainError> {
        let inner = self.inner.read().await;

        inner
            .users
            .get(id)
            .map(|u| u.claims().to_vec())
            .ok_or_else(|| Self::missing(id))
    }

    async fn add_claim(&self, id: &UserId, claim: Claim) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        inner.user_mut(id)?.add_claim(claim);

        Ok(())
    }

    async fn get_roles(&self, id: &UserId) -> Result<Vec<String>, DomainError> {
        let inner = self.inner.read().await;

        inner
            .users
            .get(id)
            .map(|u| u.roles().to_vec())
            .ok_or_else(|| Self::missing(id))
    }

    async fn add_to_role(&self, id: &UserId, role: &str) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        inner.user_mut(id)?.add_role(role);

        Ok(())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.inner.read().await.users.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::normalize_key;

    fn create_test_user(user_name: &str) -> User {
        User::new(user_name, user_name, "hashed_password")
    }

    #[tokio::test]
    async fn test_create_and_find_by_name() {
        let store = InMemoryIdentityStore::new();
        let user = create_test_user("alice@example.com");

        store.create(user.clone()).await.unwrap();

        let found = store
            .find_by_name(&normalize_key("Alice@Example.com"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id(), user.id());

        let missing = store.find_by_name("NOBODY").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let store = InMemoryIdentityStore::new();
        let user = User::new("alice", "alice@example.com", "hash");

        store.create(user.clone()).await.unwrap();

        let found = store
            .find_by_email(&normalize_key("alice@example.com"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id(), user.id());
    }

    #[tokio::test]
    async fn test_duplicate_user_name_is_conflict() {
        let store = InMemoryIdentityStore::new();

        store.create(create_test_user("dup@x.com")).await.unwrap();

        let result = store.create(create_test_user("DUP@x.com")).await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claims_round_trip() {
        let store = InMemoryIdentityStore::new();
        let user = store.create(create_test_user("alice")).await.unwrap();

        store
            .add_claim(user.id(), Claim::new("role", "reader"))
            .await
            .unwrap();
        store
            .add_claim(user.id(), Claim::new("role", "writer"))
            .await
            .unwrap();

        let claims = store.get_claims(user.id()).await.unwrap();
        assert_eq!(
            claims,
            vec![Claim::new("role", "reader"), Claim::new("role", "writer")]
        );
    }

    #[tokio::test]
    async fn test_roles() {
        let store = InMemoryIdentityStore::new();
        let user = store.create(create_test_user("alice")).await.unwrap();

        store.add_to_role(user.id(), "Admin").await.unwrap();
        store.add_to_role(user.id(), "admin").await.unwrap();

        let roles = store.get_roles(user.id()).await.unwrap();
        assert_eq!(roles, vec!["Admin".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_user_operations_fail() {
        let store = InMemoryIdentityStore::new();
        let id = UserId::generate();

        assert!(store.get_claims(&id).await.is_err());
        assert!(store.add_claim(&id, Claim::new("a", "b")).await.is_err());
        assert!(store.add_to_role(&id, "admin").await.is_err());
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_find_complete() {
        let store = Arc::new(InMemoryIdentityStore::new());
        store.create(create_test_user("u0")).await.unwrap();

        let mut handles = Vec::new();
        for i in 1..=2000 {
            let writer = store.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .create(create_test_user(&format!("u{}", i)))
                    .await
                    .map(|_| ())
            }));

            let reader = store.clone();
            handles.push(tokio::spawn(async move {
                reader.find_by_name("U0").await.map(|found| {
                    assert!(found.is_some());
                })
            }));
        }

        let all = async {
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        };

        tokio::time::timeout(std::time::Duration::from_secs(10), all)
            .await
            .expect("concurrent create and find_by_name did not finish");

        assert_eq!(store.count().await.unwrap(), 2001);
    }

    #[tokio::test]
    async fn test_with_users() {
        let store = InMemoryIdentityStore::with_users(vec![
            create_test_user("user1"),
            create_test_user("user2"),
            create_test_user("USER1"),
        ]);

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.find_by_name("USER2").await.unwrap().is_some());
    }
}
