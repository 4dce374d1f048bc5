//! # Structured Logging
//!
//! Subscriber setup plus span helpers shared by the HTTP layer.
//!
//! `RUST_LOG` wins over the configured level when set. JSON output is meant for
//! log shippers; the default human format is for local runs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/me");
/// let span = request_span!("POST", "/auth/login", client = "cli");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            user_id = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            user_id = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// Installing twice (several tests in one process) is not an error.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            Error::config_with_source(format!("Invalid log level '{}'", config.log_level), Box::new(e))
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logging {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed; keeping the existing one");
    }

    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        database_type = "sqlite",
        token_expiry_seconds = config.auth.token_expiry_seconds,
        expose_reset_token = config.auth.expose_reset_token,
        argon2_memory_kib = config.auth.hashing.memory_kib,
        metrics_enabled = %config.observability.enable_metrics,
        "sessionward configuration"
    );
}
