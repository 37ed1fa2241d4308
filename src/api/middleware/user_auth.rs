//! Bearer token authentication extractor

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::infrastructure::auth::{TokenError, VerifiedToken};

/// Extractor that requires a valid JWT in `Authorization: Bearer <jwt>`
///
/// Only the token is checked. The identity it names is not looked up again.
#[derive(Debug, Clone)]
pub struct RequireUser(pub VerifiedToken);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_jwt_token(&parts.headers)?;

        let verified = state.token_issuer.verify(&token).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");

            match e {
                TokenError::Expired => {
                    ApiError::unauthorized("Token has expired").with_code("token_expired")
                }
                _ => ApiError::unauthorized("Invalid token").with_code("invalid_token"),
            }
        })?;

        Ok(RequireUser(verified))
    }
}

/// Extract JWT token from Authorization header
pub fn extract_jwt_token(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid Authorization header encoding"))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            let token = token.trim();

            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    Err(ApiError::unauthorized(
        "Authentication required. Provide JWT token via 'Authorization: Bearer <token>' header",
    ))
}
