//! Data models shared by the session and password-reset components.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::user::{Role, User};
use crate::domain::{ResetTicketId, UserId};
use crate::errors::AuthErrorType;

/// A freshly minted session token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stored password reset ticket. The ticket value itself is never stored.
#[derive(Debug, Clone)]
pub struct ResetTicket {
    pub id: ResetTicketId,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ResetTicket {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// A ticket is expired from the instant `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// New ticket database payload.
#[derive(Debug, Clone)]
pub struct NewResetTicket {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A reset ticket handed to its owner out of band.
#[derive(Clone)]
pub struct IssuedResetTicket {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedResetTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedResetTicket")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Request-scoped authentication context derived from a valid session token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Result of running a request through authentication and, optionally, the role gate.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Accepted(AuthContext),
    Unauthorized(AuthErrorType),
    Forbidden,
}
