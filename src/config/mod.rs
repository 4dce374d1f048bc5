//! # Configuration Management
//!
//! Environment-driven configuration for the HTTP server, the SQLite store, the
//! credential subsystem and observability.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, DatabaseConfig, HashingConfig, ObservabilityConfig, ServerConfig,
    MIN_JWT_SECRET_LEN,
};
