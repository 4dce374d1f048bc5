//! Admin-only user management API handlers.
//!
//! Mounted behind the authentication and admin-role middleware.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;
use zeroize::Zeroizing;

use crate::api::error::ApiError;
use crate::api::routes::ApiState;
use crate::api::util::{ApiJson, ApiPath};
use crate::auth::models::AuthContext;
use crate::auth::user::{Role, User};
use crate::auth::user_validation::validate_user_name;
use crate::auth::Registration;
use crate::domain::UserId;
use crate::errors::Error;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    #[validate(custom(function = "validate_user_name"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRoleBody {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevokeSessionsResponse {
    pub user_id: i64,
    pub revocation_counter: i64,
}

#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserBody,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 403, description = "Admin role required", body = crate::api::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::api::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
#[instrument(skip(state, context, payload), fields(email = %payload.email, admin_id = %context.user_id()))]
pub async fn create_user_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    ApiJson(payload): ApiJson<CreateUserBody>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))?;

    let user = state
        .user_service
        .create_user(
            Registration {
                name: payload.name,
                email: payload.email,
                password: Zeroizing::new(payload.password),
                role: payload.role,
            },
            context.user_id(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.get_user(UserId::new(id)).await?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = i64, Path, description = "User identifier")),
    request_body = UpdateRoleBody,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 404, description = "User not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
#[instrument(skip(state, context, payload), fields(user_id = id, role = %payload.role))]
pub async fn update_user_role_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateRoleBody>,
) -> Result<Json<User>, ApiError> {
    let user =
        state.user_service.update_role(UserId::new(id), payload.role, context.user_id()).await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/revoke",
    params(("id" = i64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "All sessions of the user revoked", body = RevokeSessionsResponse),
        (status = 404, description = "User not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn revoke_user_sessions_handler(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<RevokeSessionsResponse>, ApiError> {
    let revocation_counter = state.user_service.revoke_sessions(UserId::new(id)).await?;
    Ok(Json(RevokeSessionsResponse { user_id: id, revocation_counter }))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User identifier")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
#[instrument(skip(state, context), fields(user_id = id, admin_id = %context.user_id()))]
pub async fn delete_user_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete_user(UserId::new(id), context.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
