//! # Configuration Settings
//!
//! Defines the configuration structure for sessionward.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load the whole configuration from environment variables and validate it.
    ///
    /// A missing `JWT_SECRET` is a fatal configuration error.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            auth: AuthConfig::from_env()?,
            observability: ObservabilityConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if !self.database.is_sqlite() {
            return Err(Error::validation("Database URL must start with 'sqlite:'"));
        }

        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(Error::config(format!(
                "JWT secret must be at least {} bytes long",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(Error::validation(
                "min_connections cannot be greater than max_connections",
            ));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, timeout_seconds: 30 }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("SESSIONWARD_HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            timeout_seconds: std::env::var("SESSIONWARD_REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_seconds),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/sessionward.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    /// Check if this is a SQLite configuration
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("DATABASE_URL").unwrap_or(defaults.url);

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_connections);

        let min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.min_connections);

        let connect_timeout_seconds = std::env::var("DATABASE_CONNECT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.connect_timeout_seconds);

        let idle_timeout_seconds = std::env::var("DATABASE_IDLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.idle_timeout_seconds);

        let auto_migrate = std::env::var("DATABASE_AUTO_MIGRATE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.auto_migrate);

        Self {
            url,
            max_connections,
            min_connections,
            connect_timeout_seconds,
            idle_timeout_seconds,
            auto_migrate,
        }
    }
}

/// Argon2id cost parameters for the credential hasher
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB
    #[validate(range(min = 8, message = "Argon2 memory cost must be at least 8 KiB"))]
    pub memory_kib: u32,

    /// Number of iterations
    #[validate(range(min = 1, message = "Argon2 iterations must be at least 1"))]
    pub iterations: u32,

    /// Degree of parallelism
    #[validate(range(min = 1, max = 16, message = "Argon2 parallelism must be between 1 and 16"))]
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        // OWASP baseline for Argon2id
        Self { memory_kib: 19_456, iterations: 2, parallelism: 1 }
    }
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// HMAC secret for session token signing/verification
    #[serde(skip_serializing, default)]
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    #[validate(range(
        min = 60,
        max = 604800,
        message = "Token expiry must be between 1 minute and 7 days"
    ))]
    pub token_expiry_seconds: u64,

    /// Minimum accepted password length
    #[validate(range(min = 1, max = 128, message = "Password minimum length must be 1-128"))]
    pub password_min_length: u64,

    /// Echo password reset tokens in the HTTP response (test mode only)
    pub expose_reset_token: bool,

    /// Password hashing cost
    #[validate(nested)]
    pub hashing: HashingConfig,

    /// Administrator created at startup if absent
    pub bootstrap_admin_email: Option<String>,

    #[serde(skip_serializing, default)]
    pub bootstrap_admin_password: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_expiry_seconds", &self.token_expiry_seconds)
            .field("password_min_length", &self.password_min_length)
            .field("expose_reset_token", &self.expose_reset_token)
            .field("hashing", &self.hashing)
            .field("bootstrap_admin_email", &self.bootstrap_admin_email)
            .finish_non_exhaustive()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_seconds: 3600, // 1 hour
            password_min_length: 6,
            expose_reset_token: false,
            hashing: HashingConfig::default(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl AuthConfig {
    /// Create AuthConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::config("JWT_SECRET must be set"))?;

        let token_expiry_seconds = std::env::var("JWT_EXPIRES_IN")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.token_expiry_seconds);

        let password_min_length = std::env::var("SESSIONWARD_PASSWORD_MIN_LENGTH")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.password_min_length);

        let expose_reset_token = std::env::var("SESSIONWARD_EXPOSE_RESET_TOKEN")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.expose_reset_token);

        let hashing = HashingConfig {
            memory_kib: std::env::var("SESSIONWARD_ARGON2_MEMORY_KIB")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.hashing.memory_kib),
            iterations: std::env::var("SESSIONWARD_ARGON2_ITERATIONS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.hashing.iterations),
            parallelism: std::env::var("SESSIONWARD_ARGON2_PARALLELISM")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.hashing.parallelism),
        };

        Ok(Self {
            jwt_secret,
            token_expiry_seconds,
            password_min_length,
            expose_reset_token,
            hashing,
            bootstrap_admin_email: std::env::var("SESSIONWARD_BOOTSTRAP_ADMIN_EMAIL").ok(),
            bootstrap_admin_password: std::env::var("SESSIONWARD_BOOTSTRAP_ADMIN_PASSWORD").ok(),
        })
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics export
    pub enable_metrics: bool,

    /// Metrics server port (0 = disabled)
    pub metrics_port: u16,

    /// Tracing service name
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: 9090,
            service_name: "sessionward".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_metrics: std::env::var("SESSIONWARD_ENABLE_METRICS")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.enable_metrics),
            metrics_port: std::env::var("SESSIONWARD_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(defaults.metrics_port),
            service_name: std::env::var("SESSIONWARD_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            log_level: std::env::var("SESSIONWARD_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: std::env::var("SESSIONWARD_JSON_LOGGING")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.json_logging),
        }
    }
}
