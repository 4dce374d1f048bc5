use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::auth::{
    middleware::{authenticate, require_admin, ValidatorState},
    CredentialHasher, LoginService, PasswordPolicy, PasswordResetFlow, ResetTicketDelivery,
    RevocationController, SigningConfig, TokenIssuer, TokenValidator, TracingResetDelivery,
    UserService,
};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::observability::track_http_metrics;
use crate::request_span;
use crate::storage::{
    AuditLogRepository, DbPool, ResetTicketStore, SqlxResetTicketStore, SqlxUserDirectory,
    UserDirectory,
};

use super::{
    docs,
    error::ApiError,
    handlers::{
        change_password_handler, create_user_handler, delete_user_handler,
        forgot_password_handler, get_user_handler, health_handler, login_handler, logout_handler,
        me_handler, register_handler, reset_password_handler, revoke_user_sessions_handler,
        update_user_role_handler,
    },
};

/// Shared handler state. Services are built once at startup.
#[derive(Clone)]
pub struct ApiState {
    pub pool: DbPool,
    pub login_service: Arc<LoginService>,
    pub user_service: Arc<UserService>,
    pub reset_flow: Arc<PasswordResetFlow>,
    pub validator: Arc<TokenValidator>,
    pub token_ttl_seconds: u64,
    pub expose_reset_token: bool,
}

impl ApiState {
    /// Wire every component from configuration, delivering reset tickets to the log.
    pub fn new(pool: DbPool, config: &AppConfig) -> Result<Self> {
        Self::with_delivery(pool, config, Arc::new(TracingResetDelivery))
    }

    pub fn with_delivery(
        pool: DbPool,
        config: &AppConfig,
        delivery: Arc<dyn ResetTicketDelivery>,
    ) -> Result<Self> {
        let auth = &config.auth;
        let signing = Arc::new(SigningConfig::from_auth_config(auth)?);
        let hasher = CredentialHasher::new(&auth.hashing)?;
        let policy = PasswordPolicy::new(auth.password_min_length as usize);

        let directory: Arc<dyn UserDirectory> = Arc::new(SqlxUserDirectory::new(pool.clone()));
        let tickets: Arc<dyn ResetTicketStore> = Arc::new(SqlxResetTicketStore::new(pool.clone()));
        let audit = Arc::new(AuditLogRepository::new(pool.clone()));
        let revocation = RevocationController::new(directory.clone()).with_audit(audit.clone());

        let login_service = LoginService::new(
            directory.clone(),
            hasher.clone(),
            TokenIssuer::new(signing.clone()),
            revocation.clone(),
            policy,
            audit.clone(),
        )?;
        let user_service =
            UserService::new(directory.clone(), hasher.clone(), policy, revocation, audit.clone());
        let reset_flow = PasswordResetFlow::new(directory.clone(), tickets, hasher, policy, delivery)
            .with_audit(audit);

        Ok(Self {
            pool,
            login_service: Arc::new(login_service),
            user_service: Arc::new(user_service),
            reset_flow: Arc::new(reset_flow),
            validator: Arc::new(TokenValidator::new(signing.clone(), directory)),
            token_ttl_seconds: signing.token_ttl_seconds(),
            expose_reset_token: auth.expose_reset_token,
        })
    }
}

pub fn build_router(state: ApiState, config: &AppConfig) -> Router {
    let validator: ValidatorState = state.validator.clone();

    // The admin guard authenticates first, so anonymous callers get 401, not 403.
    let admin_api = Router::new()
        .route("/admin/users", post(create_user_handler))
        .route("/admin/users/{id}", get(get_user_handler).delete(delete_user_handler))
        .route("/admin/users/{id}/role", put(update_user_role_handler))
        .route("/admin/users/{id}/revoke", post(revoke_user_sessions_handler))
        .route_layer(middleware::from_fn_with_state(validator.clone(), require_admin));

    let secured_api = Router::new()
        .route("/auth/logout", post(logout_handler))
        .route("/auth/change-password", post(change_password_handler))
        .route("/me", get(me_handler))
        .route_layer(middleware::from_fn_with_state(validator, authenticate))
        .merge(admin_api);

    let public_api = Router::new()
        .route("/healthz", get(health_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/forgot-password", post(forgot_password_handler))
        .route("/auth/reset-password", post(reset_password_handler));

    Router::new()
        .merge(public_api)
        .merge(secured_api)
        .with_state(state)
        .merge(docs::docs_router())
        .fallback(not_found_handler)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(middleware::from_fn_with_state(config.server.timeout(), enforce_timeout))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            request_span!(request.method(), request.uri().path())
        }))
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Abort requests that outlive `limit` with a 408 in the usual error envelope.
async fn enforce_timeout(
    State(limit): State<Duration>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(path = %path, timeout_ms = limit.as_millis() as u64, "request timed out");
            ApiError::Timeout.into_response()
        }
    }
}

async fn not_found_handler() -> ApiError {
    ApiError::route_not_found()
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "handler panicked");

    ApiError::internal("internal server error").into_response()
}
