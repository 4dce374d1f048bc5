//! User management service for admin operations.
//!
//! Callers are expected to have passed the admin role check already.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::hashing::CredentialHasher;
use crate::auth::login_service::Registration;
use crate::auth::revocation::RevocationController;
use crate::auth::user::{NewUser, Role, User};
use crate::auth::user_validation::PasswordPolicy;
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::repositories::{AuditEvent, AuditLogRepository, UserDirectory};

#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    hasher: CredentialHasher,
    policy: PasswordPolicy,
    revocation: RevocationController,
    audit_repository: Arc<AuditLogRepository>,
}

impl UserService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: CredentialHasher,
        policy: PasswordPolicy,
        revocation: RevocationController,
        audit_repository: Arc<AuditLogRepository>,
    ) -> Self {
        Self { directory, hasher, policy, revocation, audit_repository }
    }

    /// Create a user with an explicit role.
    #[instrument(skip(self, registration), fields(email = %registration.email, created_by = %created_by))]
    pub async fn create_user(&self, registration: Registration, created_by: UserId) -> Result<User> {
        self.policy.check(&registration.password, "password")?;

        let password_hash = self.hasher.hash_blocking(registration.password).await?;
        let user = self
            .directory
            .create(NewUser {
                name: registration.name.trim().to_string(),
                email: registration.email,
                password_hash,
                role: registration.role,
            })
            .await?;

        self.audit_repository
            .record_after_commit(AuditEvent::auth(
                "user.created",
                Some(user.id),
                serde_json::json!({
                    "role": user.role.as_str(),
                    "created_by": created_by.get(),
                }),
            ))
            .await;

        info!(user_id = %user.id, role = %user.role, "user created by administrator");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.directory.find_by_id(id).await?.ok_or_else(|| Error::not_found("user", id.to_string()))
    }

    /// Change a user's role. Takes effect on the next validated request, since the
    /// validator reloads the principal every time.
    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    pub async fn update_role(&self, id: UserId, role: Role, updated_by: UserId) -> Result<User> {
        let user = self.directory.update_role(id, role).await?;

        self.audit_repository
            .record_after_commit(AuditEvent::auth(
                "user.role.updated",
                Some(user.id),
                serde_json::json!({ "role": role.as_str(), "updated_by": updated_by.get() }),
            ))
            .await;

        Ok(user)
    }

    /// Revoke every session of `id`; returns the new revocation counter.
    pub async fn revoke_sessions(&self, id: UserId) -> Result<i64> {
        self.revocation.revoke(id).await
    }

    /// Remove a user. Tokens already issued to it stop validating because the
    /// principal can no longer be loaded.
    #[instrument(skip(self), fields(user_id = %id, deleted_by = %deleted_by))]
    pub async fn delete_user(&self, id: UserId, deleted_by: UserId) -> Result<()> {
        self.directory.delete(id).await?;

        self.audit_repository
            .record_after_commit(AuditEvent::auth(
                "user.deleted",
                None,
                serde_json::json!({ "user_id": id.get(), "deleted_by": deleted_by.get() }),
            ))
            .await;

        info!(user_id = %id, "user deleted by administrator");
        Ok(())
    }
}
