use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{config::AppConfig, errors::Error};

use super::routes::{build_router, ApiState};

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_api_server(config: &AppConfig, state: ApiState) -> crate::Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .map_err(|e| Error::config_with_source("Invalid API address", Box::new(e)))?;

    let router: Router = build_router(state, config);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind API server: {}", e)))?;

    info!(address = %addr, "Starting HTTP API server");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| Error::internal(format!("API server error: {}", e)))?;

    info!("API server shutdown completed");
    Ok(())
}
