//! # sessionward
//!
//! Credential and session-lifecycle service. Passwords are stored as Argon2id
//! digests, sessions are HS256-signed tokens bound to a per-user revocation counter,
//! and password resets go through single-use, time-limited tickets.
//!
//! ```text
//! HTTP (axum) → middleware: TokenValidator → AuthorizationGate
//!      ↓
//! LoginService / UserService / PasswordResetFlow / RevocationController
//!      ↓
//! UserDirectory · ResetTicketStore · AuditLogRepository (SQLite via sqlx)
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod storage;

pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
