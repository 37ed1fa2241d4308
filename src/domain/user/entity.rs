//! User entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::claim::Claim;

/// User identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup key used for user names and emails. Lookups are case-insensitive.
pub fn normalize_key(value: &str) -> String {
    value.to_uppercase()
}

/// Identity record owned by the identity gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    /// Login name, unique (case-insensitive)
    user_name: String,
    email: String,
    /// Argon2 PHC string - never exposed in serialization
    #[serde(skip_serializing, default)]
    password_hash: String,
    claims: Vec<Claim>,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(
        user_name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::generate(),
            user_name: user_name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            claims: Vec::new(),
            roles: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild a user from persisted state
    pub fn restore(
        id: UserId,
        user_name: String,
        email: String,
        password_hash: String,
        claims: Vec<Claim>,
        roles: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_name,
            email,
            password_hash,
            claims,
            roles,
            created_at,
        }
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn normalized_user_name(&self) -> String {
        normalize_key(&self.user_name)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn normalized_email(&self) -> String {
        normalize_key(&self.email)
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // Mutators

    /// Attach a claim. Repeated claim types are kept.
    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// Add a role membership, returns false if already a member
    pub fn add_role(&mut self, role: impl Into<String>) -> bool {
        let role = role.into();
        let key = normalize_key(&role);

        if self.roles.iter().any(|r| normalize_key(r) == key) {
            return false;
        }

        self.roles.push(role);
        true
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        let key = normalize_key(role);
        self.roles.iter().any(|r| normalize_key(r) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user() -> User {
        User::new("alice@example.com", "alice@example.com", "hashed_password")
    }

    #[test]
    fn test_user_creation() {
        let user = create_test_user();

        assert_eq!(user.user_name(), "alice@example.com");
        assert_eq!(user.email(), "alice@example.com");
        assert_eq!(user.password_hash(), "hashed_password");
        assert!(user.claims().is_empty());
        assert!(user.roles().is_empty());
    }

    #[test]
    fn test_user_ids_are_unique() {
        let a = create_test_user();
        let b = create_test_user();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_normalized_names() {
        let user = User::new("Alice@Example.com", "Alice@Example.com", "hash");
        assert_eq!(user.normalized_user_name(), "ALICE@EXAMPLE.COM");
        assert_eq!(user.normalized_email(), "ALICE@EXAMPLE.COM");
    }

    #[test]
    fn test_duplicate_claim_types_are_kept() {
        let mut user = create_test_user();
        user.add_claim(Claim::new("role", "reader"));
        user.add_claim(Claim::new("role", "writer"));

        assert_eq!(user.claims().len(), 2);
    }

    #[test]
    fn test_roles_are_case_insensitive() {
        let mut user = create_test_user();

        assert!(user.add_role("Admin"));
        assert!(!user.add_role("admin"));
        assert!(user.is_in_role("ADMIN"));
        assert_eq!(user.roles(), ["Admin".to_string()]);
    }

    #[test]
    fn test_user_serialization_excludes_password() {
        let user = create_test_user();

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hashed_password"));
        assert!(!json.contains("password_hash"));
    }
}
