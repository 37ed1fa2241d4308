//! Claim type - a typed assertion about an identity

use serde::{Deserialize, Serialize};

/// Registered JWT claim names minted per token
pub mod names {
    pub const SUBJECT: &str = "sub";
    pub const TOKEN_ID: &str = "jti";
    pub const EMAIL: &str = "email";
    pub const ISSUER: &str = "iss";
    pub const AUDIENCE: &str = "aud";
    pub const ISSUED_AT: &str = "iat";
    pub const EXPIRES_AT: &str = "exp";
    pub const ROLE: &str = "role";
}

/// Immutable `(type, value)` pair attached to an identity or minted per token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    claim_type: String,
    value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.claim_type, self.value)
    }
}
