//! Errors raised by the identity flows

use thiserror::Error;

use super::validation::IdentityError;
use crate::domain::DomainError;

/// Failure to authenticate a login name and secret
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("No user matches the login name")]
    NotFound,

    #[error("Secret does not match the stored hash")]
    InvalidCredential,

    #[error("Identity store failure: {0}")]
    Store(#[from] DomainError),
}

impl AuthenticationError {
    /// Whether the failure is caused by the caller's credentials
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::NotFound | Self::InvalidCredential)
    }

    /// Short label used for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidCredential => "invalid_credential",
            Self::Store(_) => "store",
        }
    }
}

/// Failure to register a new identity
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Registration rejected: {}", format_errors(.0))]
    Rejected(Vec<IdentityError>),

    #[error("Identity store failure: {0}")]
    Store(#[from] DomainError),
}

fn format_errors(errors: &[IdentityError]) -> String {
    errors
        .iter()
        .map(|e| e.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
