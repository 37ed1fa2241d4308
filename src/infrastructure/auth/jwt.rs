//! JWT token issuance and verification
//!
//! Tokens are compact HS256 JWS strings. The payload carries `iss`, `aud`,
//! `iat`, `exp`, the per-token claims (`sub`, `jti`, `email`) and every claim
//! stored for the identity. A claim type that occurs more than once is written
//! as a JSON array holding each value in order.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{map::Entry, Map, Value};
use std::fmt::Debug;
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::domain::user::{claim_names, Claim, User};

/// Default token lifetime in minutes
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Claim types controlled by the issuer; stored claims with these types are not copied
const ISSUER_CONTROLLED_CLAIMS: [&str; 5] = [
    claim_names::ISSUER,
    claim_names::AUDIENCE,
    claim_names::ISSUED_AT,
    claim_names::EXPIRES_AT,
    "nbf",
];

/// Errors raised while issuing or verifying tokens
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token configuration error: {0}")]
    Configuration(String),

    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Configuration for the token issuer
#[derive(Clone)]
pub struct TokenIssuerConfig {
    /// Symmetric signing secret, used as UTF-8 bytes
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Time-to-live of issued tokens
    pub lifetime: Duration,
    /// Tolerance applied to `exp` during verification
    pub clock_skew_seconds: u64,
}

impl Debug for TokenIssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuerConfig")
            .field("secret", &"[hidden]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime", &self.lifetime)
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .finish()
    }
}

impl TokenIssuerConfig {
    /// Create a configuration with the default lifetime and no clock skew
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            lifetime: Duration::minutes(DEFAULT_TOKEN_LIFETIME_MINUTES),
            clock_skew_seconds: 0,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew_seconds = seconds;
        self
    }

    /// Reject configurations that could never produce a usable token
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::Configuration("signing secret is empty".to_string()));
        }

        if self.issuer.trim().is_empty() {
            return Err(TokenError::Configuration("issuer is empty".to_string()));
        }

        if self.audience.trim().is_empty() {
            return Err(TokenError::Configuration("audience is empty".to_string()));
        }

        if self.lifetime <= Duration::zero() {
            return Err(TokenError::Configuration(
                "token lifetime must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// A freshly signed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Contents of a token that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub token_id: Option<String>,
    pub email: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    /// Every non-time, non-issuer claim, arrays expanded in order
    pub claims: Vec<Claim>,
}

impl VerifiedToken {
    /// All values carried for a claim type
    pub fn claim_values(&self, claim_type: &str) -> Vec<&str> {
        self.claims
            .iter()
            .filter(|c| c.claim_type() == claim_type)
            .map(Claim::value)
            .collect()
    }
}

/// Trait for token operations
#[cfg_attr(test, automock)]
pub trait TokenIssuer: Send + Sync {
    /// Issue a token for an authenticated identity and its stored claims
    fn issue(&self, user: &User, claims: &[Claim]) -> Result<IssuedToken, TokenError>;

    /// Verify signature, expiry, issuer and audience, returning the embedded claims
    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError>;

    /// Lifetime of issued tokens
    fn lifetime(&self) -> Duration;
}

/// HS256 token issuer
#[derive(Clone)]
pub struct JwtTokenIssuer {
    config: TokenIssuerConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for JwtTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenIssuer")
            .field("config", &self.config)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtTokenIssuer {
    /// Create an issuer, failing if the configuration is unusable
    pub fn new(config: TokenIssuerConfig) -> Result<Self, TokenError> {
        config.validate()?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Issue a token as of `now`
    pub fn issue_at(
        &self,
        user: &User,
        claims: &[Claim],
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let issued_at = now.timestamp();
        let expires = issued_at + self.config.lifetime.num_seconds();
        let expires_at = DateTime::from_timestamp(expires, 0).ok_or_else(|| {
            TokenError::Configuration("token expiry is out of range".to_string())
        })?;

        let mut payload = Map::new();
        payload.insert(claim_names::ISSUER.to_string(), Value::from(self.config.issuer.clone()));
        payload.insert(
            claim_names::AUDIENCE.to_string(),
            Value::from(self.config.audience.clone()),
        );

        push_claim(&mut payload, claim_names::SUBJECT, user.user_name());
        push_claim(&mut payload, claim_names::TOKEN_ID, &Uuid::new_v4().to_string());
        push_claim(&mut payload, claim_names::EMAIL, user.email());

        for claim in claims {
            if ISSUER_CONTROLLED_CLAIMS.contains(&claim.claim_type()) {
                tracing::debug!(claim_type = claim.claim_type(), "Skipping issuer-controlled stored claim");
                continue;
            }

            push_claim(&mut payload, claim.claim_type(), claim.value());
        }

        payload.insert(claim_names::ISSUED_AT.to_string(), Value::from(issued_at));
        payload.insert(claim_names::EXPIRES_AT.to_string(), Value::from(expires));

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken { token, expires_at })
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, user: &User, claims: &[Claim]) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, claims, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.clock_skew_seconds;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&[
            claim_names::EXPIRES_AT,
            claim_names::ISSUER,
            claim_names::AUDIENCE,
        ]);

        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        read_payload(data.claims)
    }

    fn lifetime(&self) -> Duration {
        self.config.lifetime
    }
}

/// Add a claim value, turning a repeated claim type into an array
fn push_claim(payload: &mut Map<String, Value>, claim_type: &str, value: &str) {
    match payload.entry(claim_type) {
        Entry::Vacant(entry) => {
            entry.insert(Value::from(value));
        }
        Entry::Occupied(mut entry) => match entry.get_mut() {
            Value::Array(values) => values.push(Value::from(value)),
            existing => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::from(value)]);
            }
        },
    }
}

fn read_payload(payload: Map<String, Value>) -> Result<VerifiedToken, TokenError> {
    let mut issuer = None;
    let mut audience = None;
    let mut issued_at = None;
    let mut expires_at = None;
    let mut claims = Vec::new();

    for (claim_type, value) in payload {
        match claim_type.as_str() {
            claim_names::ISSUER => issuer = first_string(&value),
            claim_names::AUDIENCE => audience = first_string(&value),
            claim_names::ISSUED_AT => issued_at = value.as_i64(),
            claim_names::EXPIRES_AT => expires_at = value.as_i64(),
            _ => match value {
                Value::Array(values) => claims.extend(
                    values
                        .iter()
                        .map(|v| Claim::new(claim_type.clone(), value_to_string(v))),
                ),
                other => claims.push(Claim::new(claim_type, value_to_string(&other))),
            },
        }
    }

    let find = |claim_type: &str| {
        claims
            .iter()
            .find(|c| c.claim_type() == claim_type)
            .map(|c| c.value().to_string())
    };

    let subject = find(claim_names::SUBJECT)
        .ok_or_else(|| TokenError::Invalid("missing subject".to_string()))?;
    let token_id = find(claim_names::TOKEN_ID);
    let email = find(claim_names::EMAIL);

    let expires_at = expires_at
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
        .ok_or_else(|| TokenError::Invalid("missing or invalid exp".to_string()))?;

    Ok(VerifiedToken {
        subject,
        token_id,
        email,
        issuer: issuer.ok_or_else(|| TokenError::Invalid("missing iss".to_string()))?,
        audience: audience.ok_or_else(|| TokenError::Invalid("missing aud".to_string()))?,
        issued_at: issued_at.and_then(|iat| DateTime::from_timestamp(iat, 0)),
        expires_at,
        claims,
    })
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => values.first().and_then(first_string),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
