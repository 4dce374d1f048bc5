//! # REST API Components
//!
//! Axum router, handlers and the JSON error envelope for the session service.

pub mod docs;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod util;

pub use routes::{build_router, ApiState};
pub use server::start_api_server;
