use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::errors::{AuthErrorType, Error};

/// Message shown for every rejected session token.
const UNAUTHORIZED_MESSAGE: &str = "invalid or expired credentials";

#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    Validation(String),
    Unauthorized { code: &'static str, message: String },
    Forbidden(String),
    NotFound { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    Timeout,
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized { code: "unauthorized", message: UNAUTHORIZED_MESSAGE.to_string() }
    }

    pub fn route_not_found() -> Self {
        ApiError::NotFound { code: "not_found", message: "route not found".to_string() }
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        ApiError::Internal(msg.into())
    }
}

/// Error envelope returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let (error_kind, message) = match self {
            ApiError::BadRequest { code, message }
            | ApiError::Unauthorized { code, message }
            | ApiError::NotFound { code, message }
            | ApiError::Conflict { code, message } => (code, message),
            ApiError::Validation(msg) => ("validation_error", msg),
            ApiError::Forbidden(msg) => ("forbidden", msg),
            ApiError::Timeout => ("request_timeout", "request took too long".to_string()),
            ApiError::Internal(msg) => ("internal_error", msg),
        };

        (status, Json(ErrorBody { error: error_kind.to_string(), message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let code = err.code();
        match err {
            Error::Validation { message, .. } => ApiError::Validation(message),
            Error::Auth { error_type: AuthErrorType::InvalidCredentials, .. } => {
                ApiError::Unauthorized {
                    code: "invalid_credentials",
                    message: "email or password is incorrect".to_string(),
                }
            }
            Error::Auth { .. } => ApiError::unauthorized(),
            Error::Forbidden { message } => ApiError::Forbidden(message),
            Error::Conflict { message, .. } => ApiError::Conflict { code, message },
            Error::NotFound { resource_type, .. } => {
                ApiError::NotFound { code, message: format!("{} not found", resource_type) }
            }
            Error::ResetTicket { .. } => ApiError::BadRequest {
                code,
                message: "reset token invalid or expired".to_string(),
            },
            Error::Serialization { context, .. } => {
                ApiError::BadRequest { code: "bad_request", message: context }
            }
            err @ (Error::Config { .. } | Error::Database { .. } | Error::Internal { .. }) => {
                error!(error = %err, "request failed");
                ApiError::Internal("internal server error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("invalid payload: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest { code: "bad_request", message: rejection.body_text() }
    }
}
