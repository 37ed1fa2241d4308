//! Authentication infrastructure module
//!
//! This module provides JWT issuance and verification for registered users.

mod jwt;

#[cfg(test)]
pub use jwt::MockTokenIssuer;
pub use jwt::{
    IssuedToken, JwtTokenIssuer, TokenError, TokenIssuer, TokenIssuerConfig, VerifiedToken,
    DEFAULT_TOKEN_LIFETIME_MINUTES,
};
