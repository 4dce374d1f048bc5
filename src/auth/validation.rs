//! Session token validation.
//!
//! A presented credential goes through a fixed pipeline and is rejected at the
//! first failing stage:
//!
//! 1. header shape (`Bearer <token>`)
//! 2. signature and structure
//! 3. expiry, against the validator's clock with no leeway
//! 4. principal lookup
//! 5. revocation counter comparison
//!
//! Every rejection carries its [`AuthErrorType`] for logs and metrics; clients see
//! the same response for all of them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, field, instrument, warn};

use crate::auth::jwt::SigningConfig;
use crate::auth::models::AuthContext;
use crate::errors::{AuthErrorType, Error, Result};
use crate::observability::metrics;
use crate::storage::repositories::UserDirectory;

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly two space-separated parts, the first being `bearer`
/// in any case.
pub fn parse_bearer_header(header: Option<&str>) -> std::result::Result<&str, AuthErrorType> {
    let header = header.ok_or(AuthErrorType::MalformedHeader)?;
    let parts: Vec<&str> = header.split(' ').collect();

    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AuthErrorType::MalformedHeader),
    }
}

fn reject(reason: AuthErrorType) -> Error {
    Error::auth(format!("session token rejected: {}", reason), reason)
}

/// Checks session tokens against the signing key and the user directory.
#[derive(Clone)]
pub struct TokenValidator {
    signing: Arc<SigningConfig>,
    directory: Arc<dyn UserDirectory>,
}

impl TokenValidator {
    pub fn new(signing: Arc<SigningConfig>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { signing, directory }
    }

    /// Validate an `Authorization` header value using the current time.
    pub async fn validate(&self, header: Option<&str>) -> Result<AuthContext> {
        self.validate_at(Utc::now(), header).await
    }

    /// Validate an `Authorization` header value as of `now`.
    #[instrument(skip(self, header), fields(user_id = field::Empty, reason = field::Empty), name = "validate_session_token")]
    pub async fn validate_at(&self, now: DateTime<Utc>, header: Option<&str>) -> Result<AuthContext> {
        let outcome = self.run_pipeline(now, header).await;

        let status = match &outcome {
            Ok(_) => "success",
            Err(err) => err.auth_error_type().map(|reason| reason.as_str()).unwrap_or("error"),
        };
        metrics::record_authentication(status).await;

        match &outcome {
            Ok(ctx) => {
                tracing::Span::current().record("user_id", field::display(ctx.user_id()));
                debug!(user_id = %ctx.user_id(), "session token accepted");
            }
            Err(err) => {
                tracing::Span::current().record("reason", status);
                if err.auth_error_type().is_some() {
                    debug!(reason = status, "session token rejected");
                } else {
                    warn!(error = %err, "session token validation failed");
                }
            }
        }

        outcome
    }

    async fn run_pipeline(&self, now: DateTime<Utc>, header: Option<&str>) -> Result<AuthContext> {
        let token = parse_bearer_header(header).map_err(reject)?;

        let claims = self
            .signing
            .decode(token)
            .map_err(|_| reject(AuthErrorType::BadSignature))?;

        if now.timestamp() >= claims.exp {
            return Err(reject(AuthErrorType::Expired));
        }

        let user = self
            .directory
            .find_by_id(claims.user_id())
            .await?
            .ok_or_else(|| reject(AuthErrorType::UnknownPrincipal))?;

        if user.revocation_counter != claims.tv {
            return Err(reject(AuthErrorType::Revoked));
        }

        Ok(AuthContext::new(user))
    }
}
