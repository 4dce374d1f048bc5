//! # Metrics Collection
//!
//! Prometheus metrics for HTTP traffic and the session lifecycle.
//!
//! Recording goes through a process-wide [`MetricsRecorder`] that only exists once
//! the exporter is installed, so library code and tests can call the `record_*`
//! helpers unconditionally.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use ::tracing::{info, warn};
use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Authentication outcomes exported even before the first request arrives.
const AUTH_STATUSES: &[&str] = &[
    "success",
    "malformed_header",
    "bad_signature",
    "expired",
    "unknown_principal",
    "revoked",
    "forbidden",
    "error",
];

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: f64) {
        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!(
            "http_request_duration_seconds",
            "method" => method.to_string(),
            "path" => path.to_string()
        )
        .record(duration);
    }

    /// Record a session token check, labelled by outcome
    pub fn record_authentication(&self, status: &str) {
        counter!("auth_authentications_total").increment(1);
        let labels = [("status", status.to_string())];
        counter!("auth_authentications_total", &labels).increment(1);
    }

    /// Record a credential (email + password) login attempt
    pub fn record_login(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        counter!("auth_logins_total", "status" => status).increment(1);
    }

    /// Record a revocation counter advance, labelled by what triggered it
    pub fn record_revocation(&self, trigger: &str) {
        counter!("auth_revocations_total").increment(1);
        let labels = [("trigger", trigger.to_string())];
        counter!("auth_revocations_total", &labels).increment(1);
    }

    /// Record a password reset step (`requested`, `redeemed`, `rejected`)
    pub fn record_password_reset(&self, status: &str) {
        let labels = [("status", status.to_string())];
        counter!("auth_password_resets_total", &labels).increment(1);
    }

    /// Update database connection metrics
    pub fn update_db_connections(&self, active: u32) {
        gauge!("db_connections_active").set(active as f64);
    }

    /// Register baseline auth metrics so Prometheus exports appear before events occur.
    pub fn register_auth_metrics(&self) {
        describe_counter!(
            "auth_authentications_total",
            Unit::Count,
            "Session token checks grouped by outcome"
        );
        describe_counter!("auth_logins_total", Unit::Count, "Credential login attempts");
        describe_counter!(
            "auth_revocations_total",
            Unit::Count,
            "Revocation counter advances grouped by trigger"
        );
        describe_counter!(
            "auth_password_resets_total",
            Unit::Count,
            "Password reset tickets grouped by lifecycle step"
        );

        for status in AUTH_STATUSES {
            counter!("auth_authentications_total", "status" => *status).absolute(0);
        }
        for status in ["success", "failure"] {
            counter!("auth_logins_total", "status" => status).absolute(0);
        }
        counter!("auth_revocations_total").absolute(0);
        for status in ["requested", "redeemed", "rejected"] {
            counter!("auth_password_resets_total", "status" => status).absolute(0);
        }
    }

    pub fn register_http_metrics(&self) {
        describe_counter!("http_requests_total", Unit::Count, "HTTP requests served");
        describe_histogram!(
            "http_request_duration_seconds",
            Unit::Seconds,
            "HTTP request latency"
        );
        describe_gauge!("db_connections_active", Unit::Count, "Database connections in use");
    }
}

static METRICS: once_cell::sync::Lazy<Arc<RwLock<Option<MetricsRecorder>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(RwLock::new(None)));

pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config_with_source(format!("Invalid metrics bind address '{}'", metrics_addr), Box::new(e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    let recorder = MetricsRecorder::new();
    {
        let mut metrics = METRICS.write().await;
        *metrics = Some(recorder.clone());
    }

    recorder.register_auth_metrics();
    recorder.register_http_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}

pub async fn get_metrics() -> Option<MetricsRecorder> {
    METRICS.read().await.clone()
}

pub async fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_http_request(method, path, status, duration);
    }
}

pub async fn record_authentication(status: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_authentication(status);
    }
}

pub async fn record_login(success: bool) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_login(success);
    }
}

pub async fn record_revocation(trigger: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_revocation(trigger);
    }
}

pub async fn record_password_reset(status: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_password_reset(status);
    }
}

pub async fn update_db_connections(active: u32) {
    if let Some(metrics) = get_metrics().await {
        metrics.update_db_connections(active);
    }
}

/// Axum middleware recording request count and latency per normalized path.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = normalize_path_for_metrics(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64())
        .await;
    response
}

/// Replace numeric path segments with `:id` to keep label cardinality bounded.
fn normalize_path_for_metrics(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
