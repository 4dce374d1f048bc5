//! Audit log repository for authentication and session lifecycle events.

use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Audit event descriptor for authentication activity logging.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub user_id: Option<UserId>,
    pub metadata: serde_json::Value,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEvent {
    pub fn auth(action: &str, user_id: Option<UserId>, metadata: serde_json::Value) -> Self {
        Self {
            action: action.to_string(),
            user_id,
            metadata,
            client_ip: None,
            user_agent: None,
        }
    }

    pub fn with_client(mut self, client_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.client_ip = client_ip;
        self.user_agent = user_agent;
        self
    }
}

/// Persisted audit entry.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: String,
    pub user_id: Option<i64>,
    pub metadata: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record an authentication-related audit event.
    pub async fn record_auth_event(&self, event: AuditEvent) -> Result<()> {
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|err| Error::validation(format!("Invalid audit metadata JSON: {}", err)))?;

        sqlx::query(
            "INSERT INTO audit_log (action, user_id, metadata, client_ip, user_agent, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.action.as_str())
        .bind(event.user_id)
        .bind(metadata_json)
        .bind(event.client_ip.as_deref())
        .bind(event.user_agent.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to write authentication audit event"))?;

        Ok(())
    }

    /// Record an event that follows an already committed state change. A failed
    /// insert is logged and swallowed so the caller still reports success.
    pub async fn record_after_commit(&self, event: AuditEvent) {
        let action = event.action.clone();
        if let Err(e) = self.record_auth_event(event).await {
            tracing::error!(error = %e, action = %action, "Failed to record audit event");
        }
    }

    /// Most recent entries for one principal, newest first.
    pub async fn list_for_user(&self, user_id: UserId, limit: i64) -> Result<Vec<AuditLogEntry>> {
        sqlx::query_as::<_, AuditLogEntry>(
            "SELECT id, action, user_id, metadata, client_ip, user_agent, created_at \
             FROM audit_log WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to list audit events"))
    }
}
