use axum::{routing::get, Json, Router};
use utoipa::{Modify, OpenApi};

use crate::api::error::ErrorBody;
use crate::api::handlers::auth::{
    ChangePasswordBody, ForgotPasswordBody, ForgotPasswordResponse, LoginBody, MessageResponse,
    RegisterBody, ResetPasswordBody, TokenResponse,
};
use crate::api::handlers::health::HealthResponse;
use crate::api::handlers::users::{CreateUserBody, RevokeSessionsResponse, UpdateRoleBody};
use crate::auth::user::{Role, User};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::auth::register_handler,
        crate::api::handlers::auth::login_handler,
        crate::api::handlers::auth::logout_handler,
        crate::api::handlers::auth::forgot_password_handler,
        crate::api::handlers::auth::reset_password_handler,
        crate::api::handlers::auth::change_password_handler,
        crate::api::handlers::auth::me_handler,
        crate::api::handlers::users::create_user_handler,
        crate::api::handlers::users::get_user_handler,
        crate::api::handlers::users::delete_user_handler,
        crate::api::handlers::users::update_user_role_handler,
        crate::api::handlers::users::revoke_user_sessions_handler,
    ),
    components(schemas(
        ErrorBody,
        HealthResponse,
        RegisterBody,
        LoginBody,
        TokenResponse,
        ForgotPasswordBody,
        ForgotPasswordResponse,
        ResetPasswordBody,
        ChangePasswordBody,
        MessageResponse,
        CreateUserBody,
        UpdateRoleBody,
        RevokeSessionsResponse,
        Role,
        User,
    )),
    tags(
        (name = "auth", description = "Registration, login, logout and password management"),
        (name = "users", description = "Admin-only user management"),
        (name = "health", description = "Liveness and database reachability"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build(),
            ),
        );
    }
}

pub fn docs_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
