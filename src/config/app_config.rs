use serde::Deserialize;

use crate::domain::user::PasswordOptions;
use crate::infrastructure::auth::{TokenError, TokenIssuerConfig, DEFAULT_TOKEN_LIFETIME_MINUTES};
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::storage::{PostgresConfig, StorageType};
use crate::infrastructure::user::IdentityOptions;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub jwt_security_token: JwtSecurityTokenConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Token signing settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct JwtSecurityTokenConfig {
    /// Symmetric signing key
    pub key: String,
    pub issuer: String,
    pub audience: String,
    pub expiration_minutes: i64,
    pub clock_skew_seconds: u64,
}

/// Registration rules
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub require_unique_email: bool,
    pub password: PasswordOptions,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageType,
    pub postgres: PostgresConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for JwtSecurityTokenConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            issuer: String::new(),
            audience: String::new(),
            expiration_minutes: DEFAULT_TOKEN_LIFETIME_MINUTES,
            clock_skew_seconds: 0,
        }
    }
}

impl std::fmt::Debug for JwtSecurityTokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSecurityTokenConfig")
            .field("key", &"[hidden]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiration_minutes", &self.expiration_minutes)
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .finish()
    }
}

impl JwtSecurityTokenConfig {
    /// Token lifetime, or `None` when the minutes overflow a `TimeDelta`
    pub fn lifetime(&self) -> Option<chrono::TimeDelta> {
        chrono::TimeDelta::try_minutes(self.expiration_minutes)
    }

    pub fn to_issuer_config(&self) -> Result<TokenIssuerConfig, TokenError> {
        let lifetime = self.lifetime().ok_or_else(|| {
            TokenError::Configuration(format!(
                "expiration_minutes {} is out of range",
                self.expiration_minutes
            ))
        })?;

        Ok(TokenIssuerConfig::new(&self.key, &self.issuer, &self.audience)
            .with_lifetime(lifetime)
            .with_clock_skew(self.clock_skew_seconds))
    }
}

impl IdentityConfig {
    pub fn to_options(&self) -> IdentityOptions {
        IdentityOptions {
            password: self.password.clone(),
            require_unique_email: self.require_unique_email,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let jwt = &self.jwt_security_token;

        if jwt.key.is_empty() {
            return Err(config::ConfigError::Message(
                "jwt_security_token.key must be set".to_string(),
            ));
        }

        if jwt.issuer.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "jwt_security_token.issuer must be set".to_string(),
            ));
        }

        if jwt.audience.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "jwt_security_token.audience must be set".to_string(),
            ));
        }

        if jwt.expiration_minutes <= 0 {
            return Err(config::ConfigError::Message(
                "jwt_security_token.expiration_minutes must be positive".to_string(),
            ));
        }

        if jwt.lifetime().is_none() {
            return Err(config::ConfigError::Message(
                "jwt_security_token.expiration_minutes is out of range".to_string(),
            ));
        }

        if self.storage.backend == StorageType::Postgres && self.storage.postgres.url.is_empty() {
            return Err(config::ConfigError::Message(
                "storage.postgres.url is required for the postgres backend".to_string(),
            ));
        }

        Ok(())
    }
}
