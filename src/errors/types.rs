//! # Error Types
//!
//! Error taxonomy for the sessionward service using `thiserror`.

use std::fmt;

/// Custom result type for sessionward operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sessionward
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Fatal configuration errors (e.g. missing signing secret)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed request input
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Authentication failures (bad/expired/revoked/malformed token, bad credentials)
    #[error("Authentication error: {message}")]
    Auth { message: String, error_type: AuthErrorType },

    /// Role mismatch after successful authentication
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Resource conflict errors (e.g. duplicate email)
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Password reset ticket could not be redeemed
    #[error("Reset ticket rejected: {rejection}")]
    ResetTicket { rejection: TicketRejection },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Authentication error subtypes.
///
/// The token-validation reasons are distinguishable internally (logs, metrics,
/// tests) but are rendered identically to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorType {
    MalformedHeader,
    BadSignature,
    Expired,
    UnknownPrincipal,
    Revoked,
    InvalidCredentials,
}

impl AuthErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorType::MalformedHeader => "malformed_header",
            AuthErrorType::BadSignature => "bad_signature",
            AuthErrorType::Expired => "expired",
            AuthErrorType::UnknownPrincipal => "unknown_principal",
            AuthErrorType::Revoked => "revoked",
            AuthErrorType::InvalidCredentials => "invalid_credentials",
        }
    }
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reset ticket redemption was refused. Externally always `invalid_or_expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketRejection {
    NotFound,
    AlreadyUsed,
    Expired,
}

impl TicketRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketRejection::NotFound => "not_found",
            TicketRejection::AlreadyUsed => "already_used",
            TicketRejection::Expired => "expired",
        }
    }
}

impl fmt::Display for TicketRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S, error_type: AuthErrorType) -> Self {
        Self::Auth { message: message.into(), error_type }
    }

    /// Create an authorization (role) error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a reset ticket rejection
    pub fn reset_ticket(rejection: TicketRejection) -> Self {
        Self::ResetTicket { rejection }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// The authentication reason, if this is an authentication failure.
    pub fn auth_error_type(&self) -> Option<AuthErrorType> {
        match self {
            Error::Auth { error_type, .. } => Some(*error_type),
            _ => None,
        }
    }

    /// Stable machine code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "configuration_error",
            Error::Validation { .. } => "validation_error",
            Error::Auth { .. } => "unauthorized",
            Error::Forbidden { .. } => "forbidden",
            Error::Conflict { resource_type, .. } if resource_type == "user" => "duplicate_email",
            Error::Conflict { .. } => "conflict",
            Error::NotFound { resource_type, .. } if resource_type == "user" => "user_not_found",
            Error::NotFound { .. } => "not_found",
            Error::ResetTicket { .. } => "invalid_or_expired",
            Error::Database { .. } | Error::Serialization { .. } | Error::Internal { .. } => {
                "internal_error"
            }
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 500,
            Error::Validation { .. } => 422,
            Error::Auth { .. } => 401,
            Error::Forbidden { .. } => 403,
            Error::Conflict { .. } => 409,
            Error::NotFound { .. } => 404,
            Error::ResetTicket { .. } => 400,
            Error::Database { .. } => 500,
            Error::Serialization { .. } => 400,
            Error::Internal { .. } => 500,
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let first_field = field_errors.keys().next().map(|field| field.to_string());
        let message = field_errors
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::Validation { message: format!("Validation failed: {}", message), field: first_field }
    }
}
