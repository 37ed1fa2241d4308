//! User endpoints
//!
//! Registration and token issuance are open. The remaining routes are
//! placeholders that only require a valid bearer token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, JsonRejection};
use crate::domain::user::{AuthenticationError, IdentityError, RegistrationError};
use crate::infrastructure::observability::{record_authentication_failure, record_token_issued};

const TOKEN_CREATION_FAILED: &str = "error while creating token";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Create the user router
pub fn create_user_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_values).post(create_value))
        .route("/register", post(register))
        .route("/token", post(create_token))
        .route("/test", post(echo))
        .route(
            "/{id}",
            get(get_value).put(update_value).delete(delete_value),
        )
}

/// Credentials body shared by register and token
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub succeeded: bool,
    pub errors: Vec<IdentityError>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    /// RFC 3339, UTC
    pub expiration: String,
}

/// Register a new user
///
/// POST /api/User/register
///
/// The email doubles as the login name. Rule violations come back as a
/// `[{code, description}]` array with status 400.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(JsonRejection::into_bad_request)?;

    match state
        .user_service
        .register(&request.email, &request.email, &request.password)
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id(), "User registered");

            Ok(Json(RegisterResponse {
                succeeded: true,
                errors: Vec::new(),
            })
            .into_response())
        }
        Err(RegistrationError::Rejected(errors)) => {
            info!(
                codes = ?errors.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(),
                "Registration rejected"
            );

            Ok((StatusCode::BAD_REQUEST, Json(errors)).into_response())
        }
        Err(RegistrationError::Store(e)) => {
            error!(error = %e, "Registration failed");
            Err(ApiError::internal("error while registering user"))
        }
    }
}

/// Exchange credentials for a signed token
///
/// POST /api/User/token
///
/// Internal failures answer 500 with the bare JSON string
/// `"error while creating token"`.
pub async fn create_token(
    State(state): State<AppState>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, Response> {
    let Json(request) = body.map_err(|r| r.into_bad_request().into_response())?;

    let (user, claims) = state
        .user_service
        .authenticate(&request.email, &request.password)
        .await
        .map_err(|e| match e {
            AuthenticationError::Store(e) => {
                error!(error = %e, "Identity store failed during token creation");
                token_creation_failed()
            }
            e => {
                warn!(reason = e.reason(), "Token request rejected");
                record_authentication_failure(e.reason());
                ApiError::unauthorized(INVALID_CREDENTIALS).into_response()
            }
        })?;

    let issued = state.token_issuer.issue(&user, &claims).map_err(|e| {
        error!(error = %e, subject = user.user_name(), "Token issuance failed");
        token_creation_failed()
    })?;

    record_token_issued();
    info!(subject = user.user_name(), "Token issued");

    Ok(Json(TokenResponse {
        token: issued.token,
        expiration: issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

fn token_creation_failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(TOKEN_CREATION_FAILED)).into_response()
}

/// GET /api/User
pub async fn list_values(_user: RequireUser) -> Json<Vec<&'static str>> {
    Json(vec!["value1", "value2"])
}

/// GET /api/User/{id}
pub async fn get_value(_user: RequireUser, Path(_id): Path<i64>) -> Json<&'static str> {
    Json("value")
}

/// POST /api/User
pub async fn create_value(_user: RequireUser, Json(_value): Json<String>) -> StatusCode {
    StatusCode::OK
}

/// PUT /api/User/{id}
pub async fn update_value(
    _user: RequireUser,
    Path(_id): Path<i64>,
    Json(_value): Json<String>,
) -> StatusCode {
    StatusCode::OK
}

/// DELETE /api/User/{id}
pub async fn delete_value(_user: RequireUser, Path(_id): Path<i64>) -> StatusCode {
    StatusCode::OK
}

/// POST /api/User/test
///
/// Echoes the JSON string body back to an authenticated caller.
pub async fn echo(RequireUser(token): RequireUser, Json(value): Json<String>) -> Json<String> {
    info!(subject = %token.subject, "Echo requested");
    Json(value)
}
