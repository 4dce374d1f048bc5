//! Password reset handshake.
//!
//! `request` mints a single-use ticket valid for [`RESET_TICKET_TTL_MINUTES`] and
//! hands it to a [`ResetTicketDelivery`]. `redeem` exchanges a ticket and a new
//! password for a rotated password digest and an advanced revocation counter, so
//! all sessions opened before the reset stop validating.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use crate::auth::hashing::CredentialHasher;
use crate::auth::models::{IssuedResetTicket, NewResetTicket};
use crate::auth::user::User;
use crate::auth::user_validation::PasswordPolicy;
use crate::domain::UserId;
use crate::errors::{Error, Result, TicketRejection};
use crate::observability::metrics;
use crate::storage::repositories::{
    digest_ticket_token, AuditEvent, AuditLogRepository, ResetTicketStore, UserDirectory,
};

pub const RESET_TICKET_TTL_MINUTES: i64 = 30;

/// 256 bits of entropy per ticket.
const TICKET_BYTES: usize = 32;

/// Out-of-band channel that carries a reset ticket to its owner.
#[async_trait]
pub trait ResetTicketDelivery: Send + Sync {
    async fn deliver(&self, user: &User, ticket: &IssuedResetTicket) -> Result<()>;
}

/// Delivery that only records the event in the service log. The ticket value is
/// never written out.
#[derive(Debug, Clone, Default)]
pub struct TracingResetDelivery;

#[async_trait]
impl ResetTicketDelivery for TracingResetDelivery {
    async fn deliver(&self, user: &User, ticket: &IssuedResetTicket) -> Result<()> {
        info!(
            user_id = %user.id,
            email = %user.email,
            expires_at = %ticket.expires_at,
            "password reset ticket issued for delivery"
        );
        Ok(())
    }
}

fn generate_ticket_token() -> String {
    let mut bytes = Zeroizing::new([0u8; TICKET_BYTES]);
    OsRng.fill_bytes(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(&bytes[..])
}

#[derive(Clone)]
pub struct PasswordResetFlow {
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn ResetTicketStore>,
    hasher: CredentialHasher,
    policy: PasswordPolicy,
    delivery: Arc<dyn ResetTicketDelivery>,
    audit_repository: Option<Arc<AuditLogRepository>>,
}

impl PasswordResetFlow {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn ResetTicketStore>,
        hasher: CredentialHasher,
        policy: PasswordPolicy,
        delivery: Arc<dyn ResetTicketDelivery>,
    ) -> Self {
        Self { directory, store, hasher, policy, delivery, audit_repository: None }
    }

    pub fn with_audit(mut self, audit_repository: Arc<AuditLogRepository>) -> Self {
        self.audit_repository = Some(audit_repository);
        self
    }

    pub async fn request(&self, email: &str) -> Result<IssuedResetTicket> {
        self.request_at(Utc::now(), email).await
    }

    /// Issue a ticket for the principal owning `email` as of `now`.
    ///
    /// An unknown email is a `user` not-found error; callers decide whether to
    /// reveal that.
    #[instrument(skip(self, email), name = "password_reset_request")]
    pub async fn request_at(&self, now: DateTime<Utc>, email: &str) -> Result<IssuedResetTicket> {
        let user = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| Error::not_found("user", email))?;

        let token = generate_ticket_token();
        let expires_at = now + Duration::minutes(RESET_TICKET_TTL_MINUTES);

        self.store
            .create(NewResetTicket {
                user_id: user.id,
                token_hash: digest_ticket_token(&token),
                expires_at,
                created_at: now,
            })
            .await?;

        let issued = IssuedResetTicket { token, user_id: user.id, expires_at };
        self.delivery.deliver(&user, &issued).await?;

        metrics::record_password_reset("requested").await;
        self.audit("auth.password_reset.requested", Some(user.id), serde_json::json!({
            "expires_at": expires_at.to_rfc3339(),
        }))
        .await;

        Ok(issued)
    }

    pub async fn redeem(&self, token: &str, new_password: Zeroizing<String>) -> Result<UserId> {
        self.redeem_at(Utc::now(), token, new_password).await
    }

    /// Redeem `token` as of `now`, setting `new_password`.
    ///
    /// Missing, used and expired tickets are all rejected with the same external
    /// error. The claim, the password rotation and the counter advance commit or
    /// roll back together.
    #[instrument(skip(self, token, new_password), name = "password_reset_redeem")]
    pub async fn redeem_at(
        &self,
        now: DateTime<Utc>,
        token: &str,
        new_password: Zeroizing<String>,
    ) -> Result<UserId> {
        self.policy.check(&new_password, "password")?;

        let outcome = self.redeem_checked(now, token, new_password).await;

        match &outcome {
            Ok(user_id) => {
                metrics::record_password_reset("redeemed").await;
                metrics::record_revocation("password_reset").await;
                info!(user_id = %user_id, "password reset redeemed");
                self.audit("auth.password_reset.redeemed", Some(*user_id), serde_json::json!({}))
                    .await;
            }
            Err(Error::ResetTicket { rejection }) => {
                metrics::record_password_reset("rejected").await;
                warn!(rejection = rejection.as_str(), "password reset ticket rejected");
            }
            Err(_) => {}
        }

        outcome
    }

    async fn redeem_checked(
        &self,
        now: DateTime<Utc>,
        token: &str,
        new_password: Zeroizing<String>,
    ) -> Result<UserId> {
        // Reject obviously dead tickets before paying for a hash. The store
        // re-checks everything under its write lock.
        match self.store.find_by_token(token).await? {
            None => return Err(Error::reset_ticket(TicketRejection::NotFound)),
            Some(ticket) if ticket.is_used() => {
                return Err(Error::reset_ticket(TicketRejection::AlreadyUsed))
            }
            Some(ticket) if ticket.is_expired_at(now) => {
                return Err(Error::reset_ticket(TicketRejection::Expired))
            }
            Some(_) => {}
        }

        let password_hash = self.hasher.hash_blocking(new_password).await?;
        self.store.redeem(token, &password_hash, now).await
    }

    async fn audit(&self, action: &str, user_id: Option<UserId>, metadata: serde_json::Value) {
        if let Some(audit) = &self.audit_repository {
            audit.record_after_commit(AuditEvent::auth(action, user_id, metadata)).await;
        }
    }
}
