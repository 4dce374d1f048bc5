//! Session revocation.
//!
//! Advancing a principal's revocation counter invalidates every token minted
//! before the advance. Nothing is blacklisted; validators compare the counter
//! embedded in each token with the stored one.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::UserId;
use crate::errors::Result;
use crate::observability::metrics;
use crate::storage::repositories::{AuditEvent, AuditLogRepository, UserDirectory};

/// What caused a revocation; used for audit and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationTrigger {
    Logout,
    PasswordChange,
    PasswordReset,
    Admin,
}

impl RevocationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationTrigger::Logout => "logout",
            RevocationTrigger::PasswordChange => "password_change",
            RevocationTrigger::PasswordReset => "password_reset",
            RevocationTrigger::Admin => "admin",
        }
    }
}

#[derive(Clone)]
pub struct RevocationController {
    directory: Arc<dyn UserDirectory>,
    audit_repository: Option<Arc<AuditLogRepository>>,
}

impl RevocationController {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory, audit_repository: None }
    }

    pub fn with_audit(mut self, audit_repository: Arc<AuditLogRepository>) -> Self {
        self.audit_repository = Some(audit_repository);
        self
    }

    /// Revoke every outstanding session of `user_id` on an administrator's
    /// behalf, returning the new counter.
    pub async fn revoke(&self, user_id: UserId) -> Result<i64> {
        self.revoke_for(user_id, RevocationTrigger::Admin).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, trigger = trigger.as_str()), name = "revoke_sessions")]
    pub async fn revoke_for(&self, user_id: UserId, trigger: RevocationTrigger) -> Result<i64> {
        let counter = self.directory.increment_revocation_counter(user_id).await?;

        metrics::record_revocation(trigger.as_str()).await;
        info!(user_id = %user_id, counter, trigger = trigger.as_str(), "sessions revoked");

        if let Some(audit) = &self.audit_repository {
            audit
                .record_after_commit(AuditEvent::auth(
                    "auth.sessions.revoked",
                    Some(user_id),
                    serde_json::json!({ "trigger": trigger.as_str(), "counter": counter }),
                ))
                .await;
        }

        Ok(counter)
    }
}
