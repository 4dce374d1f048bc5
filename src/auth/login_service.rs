//! Credential flows for principals: registration, login, logout and password change.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use crate::auth::hashing::CredentialHasher;
use crate::auth::jwt::TokenIssuer;
use crate::auth::models::IssuedToken;
use crate::auth::revocation::{RevocationController, RevocationTrigger};
use crate::auth::user::{NewUser, Role, User};
use crate::auth::user_validation::PasswordPolicy;
use crate::domain::UserId;
use crate::errors::{AuthErrorType, Error, Result};
use crate::observability::metrics;
use crate::storage::repositories::{AuditEvent, AuditLogRepository, UserDirectory};

const DUMMY_PASSWORD: &str = "dummy_startup_value";

fn invalid_credentials() -> Error {
    Error::auth("Invalid email or password", AuthErrorType::InvalidCredentials)
}

/// Client details recorded with audit events.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Registration payload after request validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: Zeroizing<String>,
    pub role: Role,
}

#[derive(Clone)]
pub struct LoginService {
    directory: Arc<dyn UserDirectory>,
    hasher: CredentialHasher,
    issuer: TokenIssuer,
    revocation: RevocationController,
    policy: PasswordPolicy,
    audit_repository: Arc<AuditLogRepository>,
    /// Verified against when the email is unknown, so both paths cost one hash.
    dummy_hash: Arc<String>,
}

impl LoginService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: CredentialHasher,
        issuer: TokenIssuer,
        revocation: RevocationController,
        policy: PasswordPolicy,
        audit_repository: Arc<AuditLogRepository>,
    ) -> Result<Self> {
        let dummy_hash = Arc::new(hasher.hash(DUMMY_PASSWORD)?);
        Ok(Self { directory, hasher, issuer, revocation, policy, audit_repository, dummy_hash })
    }

    /// Create a principal with a freshly hashed password.
    #[instrument(skip(self, registration), fields(email = %registration.email, role = %registration.role))]
    pub async fn register(&self, registration: Registration) -> Result<User> {
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
                "auth.user.registered",
                Some(user.id),
                serde_json::json!({ "role": user.role.as_str() }),
            ))
            .await;

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check email and password and mint a session token.
    ///
    /// Unknown email and wrong password produce the same error after the same
    /// amount of hashing work.
    #[instrument(skip(self, password, client), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: Zeroizing<String>,
        client: ClientInfo,
    ) -> Result<(User, IssuedToken)> {
        let credentials = match self.directory.find_with_password(email).await? {
            Some(credentials) => credentials,
            None => {
                let _ = self.hasher.verify_blocking(self.dummy_hash.to_string(), password).await;
                warn!("login attempt for non-existent user");
                metrics::record_login(false).await;
                self.audit_repository
                    .record_after_commit(
                        AuditEvent::auth(
                            "auth.login.failed",
                            None,
                            serde_json::json!({ "reason": "unknown_email" }),
                        )
                        .with_client(client.client_ip, client.user_agent),
                    )
                    .await;
                return Err(invalid_credentials());
            }
        };

        let user = credentials.user;
        if !self.hasher.verify_blocking(credentials.password_hash, password).await {
            warn!(user_id = %user.id, "login attempt with incorrect password");
            metrics::record_login(false).await;
            self.audit_repository
                .record_after_commit(
                    AuditEvent::auth(
                        "auth.login.failed",
                        Some(user.id),
                        serde_json::json!({ "reason": "invalid_password" }),
                    )
                    .with_client(client.client_ip, client.user_agent),
                )
                .await;
            return Err(invalid_credentials());
        }

        let token = self.issuer.issue_default(user.id, user.revocation_counter)?;

        self.audit_repository
            .record_after_commit(
                AuditEvent::auth("auth.login.success", Some(user.id), serde_json::json!({}))
                    .with_client(client.client_ip, client.user_agent),
            )
            .await;

        metrics::record_login(true).await;
        info!(user_id = %user.id, "user logged in successfully");
        Ok((user, token))
    }

    /// Invalidate every session of `user_id`, including the one making the call.
    pub async fn logout(&self, user_id: UserId) -> Result<()> {
        self.revocation.revoke_for(user_id, RevocationTrigger::Logout).await?;
        Ok(())
    }

    /// Replace the password after checking the current one. Every older session is
    /// revoked; the returned token carries the new counter.
    #[instrument(skip(self, current_password, new_password), fields(user_id = %user_id))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: Zeroizing<String>,
        new_password: Zeroizing<String>,
    ) -> Result<IssuedToken> {
        self.policy.check(&new_password, "new_password")?;

        let credentials = self
            .directory
            .find_credentials_by_id(user_id)
            .await?
            .ok_or_else(|| Error::not_found("user", user_id.to_string()))?;

        if !self.hasher.verify_blocking(credentials.password_hash, current_password).await {
            warn!(user_id = %user_id, "password change with incorrect current password");
            return Err(invalid_credentials());
        }

        let password_hash = self.hasher.hash_blocking(new_password).await?;
        let counter = self.directory.rotate_password(user_id, &password_hash).await?;
        metrics::record_revocation(RevocationTrigger::PasswordChange.as_str()).await;

        self.audit_repository
            .record_after_commit(AuditEvent::auth(
                "auth.password.changed",
                Some(user_id),
                serde_json::json!({ "counter": counter }),
            ))
            .await;

        info!(user_id = %user_id, "password changed; older sessions revoked");
        self.issuer.issue_default(user_id, counter)
    }

    /// Create the configured administrator unless the email already exists.
    pub async fn ensure_bootstrap_admin(
        &self,
        email: &str,
        password: Zeroizing<String>,
    ) -> Result<Option<User>> {
        if self.directory.find_by_email(email).await?.is_some() {
            info!(email = %email, "bootstrap administrator already present");
            return Ok(None);
        }

        let user = self
            .register(Registration {
                name: "Administrator".to_string(),
                email: email.to_string(),
                password,
                role: Role::Admin,
            })
            .await?;
        info!(user_id = %user.id, "bootstrap administrator created");
        Ok(Some(user))
    }
}
