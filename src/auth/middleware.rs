//! Axum middleware for authentication and authorization.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, field, warn};

use crate::api::error::ApiError;
use crate::auth::authorization::AuthorizationGate;
use crate::auth::models::AuthOutcome;
use crate::auth::user::Role;
use crate::auth::validation::TokenValidator;
use crate::observability::metrics;

pub type ValidatorState = Arc<TokenValidator>;

/// Validate the bearer token and attach the resulting [`AuthContext`] to the request.
///
/// [`AuthContext`]: crate::auth::models::AuthContext
pub async fn authenticate(
    State(validator): State<ValidatorState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    guard(&validator, None, request, next).await
}

/// Like [`authenticate`], then reject callers that do not hold the admin role.
pub async fn require_admin(
    State(validator): State<ValidatorState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    guard(&validator, Some(Role::Admin), request, next).await
}

async fn guard(
    validator: &TokenValidator,
    required: Option<Role>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request.headers().get(AUTHORIZATION).map(|value| value.to_str());
    let header = match header {
        Some(Ok(value)) => Some(value),
        // Non-ASCII header bytes cannot be a bearer token.
        Some(Err(_)) => Some(""),
        None => None,
    };

    let authenticated = validator.validate(header).await;
    match AuthorizationGate::narrow(authenticated, required)? {
        AuthOutcome::Accepted(context) => {
            tracing::Span::current().record("user_id", field::display(context.user_id()));
            debug!(user_id = %context.user_id(), role = %context.role(), "request authorized");
            request.extensions_mut().insert(context);
            Ok(next.run(request).await)
        }
        AuthOutcome::Unauthorized(reason) => {
            warn!(path = %request.uri().path(), reason = reason.as_str(), "authentication failed");
            Err(ApiError::unauthorized())
        }
        AuthOutcome::Forbidden => {
            metrics::record_authentication("forbidden").await;
            Err(ApiError::Forbidden("insufficient role for this operation".to_string()))
        }
    }
}
