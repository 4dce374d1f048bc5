//! Public credential endpoints plus the authenticated session endpoints.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn, Instrument};
use utoipa::ToSchema;
use validator::Validate;
use zeroize::Zeroizing;

use crate::api::error::ApiError;
use crate::api::routes::ApiState;
use crate::api::util::{client_info, ApiJson};
use crate::auth::models::{AuthContext, IssuedToken};
use crate::auth::user::{Role, User};
use crate::auth::user_validation::validate_user_name;
use crate::auth::Registration;
use crate::errors::Error;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    #[validate(custom(function = "validate_user_name"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    /// Minimum length is configured by `auth.password_min_length`
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

impl TokenResponse {
    fn new(issued: IssuedToken, expires_in: u64) -> Self {
        Self { token: issued.token, expires_in, expires_at: issued.expires_at }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordBody {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Only present when the service runs with `expose_reset_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    #[validate(length(min = 1, message = "is required"))]
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn validate<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterBody,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 409, description = "Email already registered", body = crate::api::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register_handler(
    State(state): State<ApiState>,
    ApiJson(payload): ApiJson<RegisterBody>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    validate(&payload)?;

    let user = state
        .login_service
        .register(Registration {
            name: payload.name,
            email: payload.email,
            password: Zeroizing::new(payload.password),
            role: Role::User,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginBody,
    responses(
        (status = 200, description = "Session token issued", body = TokenResponse),
        (status = 401, description = "Invalid email or password", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, headers, payload), fields(email = %payload.email))]
pub async fn login_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LoginBody>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate(&payload)?;

    let (_, token) = state
        .login_service
        .login(&payload.email, Zeroizing::new(payload.password), client_info(&headers))
        .await?;

    Ok(Json(TokenResponse::new(token, state.token_ttl_seconds)))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "All sessions of the caller revoked"),
        (status = 401, description = "Missing or invalid session", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
) -> Result<StatusCode, ApiError> {
    state.login_service.logout(context.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordBody,
    responses(
        (status = 200, description = "Reset token issued (test mode)", body = ForgotPasswordResponse),
        (status = 202, description = "Request accepted", body = ForgotPasswordResponse),
        (status = 404, description = "Unknown email (test mode only)", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn forgot_password_handler(
    State(state): State<ApiState>,
    ApiJson(payload): ApiJson<ForgotPasswordBody>,
) -> Result<(StatusCode, Json<ForgotPasswordResponse>), ApiError> {
    validate(&payload)?;

    if state.expose_reset_token {
        let issued = state.reset_flow.request(&payload.email).await?;
        return Ok((
            StatusCode::OK,
            Json(ForgotPasswordResponse {
                message: "reset token generated (test mode)".to_string(),
                reset_token: Some(issued.token),
            }),
        ));
    }

    // Issue off the request path so known and unknown addresses answer alike,
    // in body and in latency.
    let flow = state.reset_flow.clone();
    let email = payload.email;
    tokio::spawn(
        async move {
            match flow.request(&email).await {
                Ok(_) => {}
                Err(Error::NotFound { .. }) => info!("password reset requested for unknown email"),
                Err(err) => warn!(error = %err, "password reset request failed"),
            }
        }
        .in_current_span(),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ForgotPasswordResponse {
            message: "if the account exists, reset instructions have been sent".to_string(),
            reset_token: None,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordBody,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Reset token invalid or expired", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn reset_password_handler(
    State(state): State<ApiState>,
    ApiJson(payload): ApiJson<ResetPasswordBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate(&payload)?;

    state.reset_flow.redeem(&payload.token, Zeroizing::new(payload.new_password)).await?;

    Ok(Json(MessageResponse { message: "password updated".to_string() }))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordBody,
    responses(
        (status = 200, description = "Password changed; fresh session token", body = TokenResponse),
        (status = 401, description = "Missing session or wrong current password", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "auth"
)]
#[instrument(skip(state, context, payload), fields(user_id = %context.user_id()))]
pub async fn change_password_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    ApiJson(payload): ApiJson<ChangePasswordBody>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate(&payload)?;

    let token = state
        .login_service
        .change_password(
            context.user_id(),
            Zeroizing::new(payload.current_password),
            Zeroizing::new(payload.new_password),
        )
        .await?;

    Ok(Json(TokenResponse::new(token, state.token_ttl_seconds)))
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile of the authenticated user", body = User),
        (status = 401, description = "Missing or invalid session", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "auth"
)]
pub async fn me_handler(Extension(context): Extension<AuthContext>) -> Json<User> {
    Json(context.user)
}
