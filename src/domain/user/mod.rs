//! User domain
//!
//! This module provides domain types and traits for identities: the user
//! entity, claims, validation rules, flow errors and the identity store trait.

mod claim;
mod entity;
mod error;
mod repository;
mod validation;

pub use claim::{names as claim_names, Claim};
pub use entity::{normalize_key, User, UserId};
pub use error::{AuthenticationError, RegistrationError};
pub use repository::IdentityStore;
pub use validation::{
    validate_email, validate_password, validate_user_name, IdentityError, PasswordOptions,
};

#[cfg(test)]
pub use repository::MockIdentityStore;
