//! Domain layer - identity types, rules and storage traits

pub mod error;
pub mod user;

pub use error::DomainError;
pub use user::{Claim, IdentityStore, User, UserId};
