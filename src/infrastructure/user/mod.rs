//! User infrastructure module
//!
//! Implementations behind the identity gateway: Argon2 password hashing,
//! in-memory and PostgreSQL identity stores, and the user manager.

mod password;
mod postgres_repository;
mod repository;
mod service;

pub use password::{Argon2Hasher, PasswordHasher};
pub use postgres_repository::PostgresIdentityStore;
pub use repository::InMemoryIdentityStore;
pub use service::{IdentityOptions, UserManager};
