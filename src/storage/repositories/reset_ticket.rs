//! Password reset ticket store.
//!
//! Ticket values are never persisted. Rows are keyed by the hex SHA-256 digest of
//! the value and every lookup digests the presented value first.

use crate::auth::models::{NewResetTicket, ResetTicket};
use crate::domain::{ResetTicketId, UserId};
use crate::errors::{Error, Result, TicketRejection};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct ResetTicketRow {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ResetTicketRow> for ResetTicket {
    fn from(row: ResetTicketRow) -> Self {
        ResetTicket {
            id: ResetTicketId::new(row.id),
            user_id: UserId::new(row.user_id),
            expires_at: row.expires_at,
            used_at: row.used_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct ClaimedRow {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Hex SHA-256 digest under which a ticket value is stored.
pub fn digest_ticket_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait]
pub trait ResetTicketStore: Send + Sync {
    /// Persist a new, unused ticket
    async fn create(&self, ticket: NewResetTicket) -> Result<ResetTicket>;

    /// Look up a ticket by its plaintext value
    async fn find_by_token(&self, token: &str) -> Result<Option<ResetTicket>>;

    /// Flip `used_at` if the ticket is still unused. Returns whether this call flipped it.
    async fn mark_used(&self, token: &str, used_at: DateTime<Utc>) -> Result<bool>;

    /// Claim the ticket and rotate the owner's password in one transaction.
    ///
    /// The claim is the first statement of the transaction, so concurrent callers
    /// serialize on the write lock and exactly one of them observes an unused row.
    /// On success the owner's password digest is replaced and its revocation counter
    /// advanced; on any rejection nothing is changed.
    async fn redeem(
        &self,
        token: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<UserId>;
}

#[derive(Debug, Clone)]
pub struct SqlxResetTicketStore {
    pool: DbPool,
}

impl SqlxResetTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Work out why a claim touched no row.
    async fn classify_unclaimed(&self, token: &str, now: DateTime<Utc>) -> Result<TicketRejection> {
        Ok(match self.find_by_token(token).await? {
            None => TicketRejection::NotFound,
            Some(ticket) if ticket.is_used() => TicketRejection::AlreadyUsed,
            Some(ticket) if ticket.is_expired_at(now) => TicketRejection::Expired,
            // Claimed and rolled back by a concurrent caller whose rotation failed
            Some(_) => TicketRejection::AlreadyUsed,
        })
    }
}

#[async_trait]
impl ResetTicketStore for SqlxResetTicketStore {
    #[instrument(skip(self, ticket), fields(user_id = %ticket.user_id), name = "db_create_reset_ticket")]
    async fn create(&self, ticket: NewResetTicket) -> Result<ResetTicket> {
        let row = sqlx::query_as::<_, ResetTicketRow>(
            r#"
            INSERT INTO password_resets (user_id, token_hash, expires_at, used_at, created_at)
            VALUES (?, ?, ?, NULL, ?)
            RETURNING id, user_id, expires_at, used_at, created_at
            "#,
        )
        .bind(ticket.user_id)
        .bind(&ticket.token_hash)
        .bind(ticket.expires_at)
        .bind(ticket.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to create password reset ticket"))?;

        Ok(row.into())
    }

    #[instrument(skip(self, token), name = "db_find_reset_ticket")]
    async fn find_by_token(&self, token: &str) -> Result<Option<ResetTicket>> {
        let row = sqlx::query_as::<_, ResetTicketRow>(
            "SELECT id, user_id, expires_at, used_at, created_at FROM password_resets WHERE token_hash = ?",
        )
        .bind(digest_ticket_token(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to fetch password reset ticket"))?;

        Ok(row.map(ResetTicket::from))
    }

    #[instrument(skip(self, token), name = "db_mark_reset_ticket_used")]
    async fn mark_used(&self, token: &str, used_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE password_resets SET used_at = ? WHERE token_hash = ? AND used_at IS NULL",
        )
        .bind(used_at)
        .bind(digest_ticket_token(token))
        .execute(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to mark password reset ticket used"))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, token, new_password_hash), name = "db_redeem_reset_ticket")]
    async fn redeem(
        &self,
        token: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<UserId> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::database(err, "Failed to start redemption transaction"))?;

        // Must stay the first statement: a read first would make the later write
        // upgrade fail with SQLITE_BUSY instead of waiting on the busy handler.
        let claimed = sqlx::query_as::<_, ClaimedRow>(
            r#"
            UPDATE password_resets
            SET used_at = ?
            WHERE token_hash = ? AND used_at IS NULL
            RETURNING user_id, expires_at
            "#,
        )
        .bind(now)
        .bind(digest_ticket_token(token))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to claim password reset ticket"))?;

        let Some(claimed) = claimed else {
            tx.rollback()
                .await
                .map_err(|err| Error::database(err, "Failed to roll back redemption"))?;
            let rejection = self.classify_unclaimed(token, now).await?;
            return Err(Error::reset_ticket(rejection));
        };

        if now >= claimed.expires_at {
            tx.rollback()
                .await
                .map_err(|err| Error::database(err, "Failed to roll back redemption"))?;
            return Err(Error::reset_ticket(TicketRejection::Expired));
        }

        let user_id = UserId::new(claimed.user_id);
        let counter: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = ?, revocation_counter = revocation_counter + 1, updated_at = ?
            WHERE id = ?
            RETURNING revocation_counter
            "#,
        )
        .bind(new_password_hash)
        .bind(now)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to rotate password during redemption"))?;

        if counter.is_none() {
            tx.rollback()
                .await
                .map_err(|err| Error::database(err, "Failed to roll back redemption"))?;
            return Err(Error::not_found("user", user_id.to_string()));
        }

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit redemption transaction"))?;

        Ok(user_id)
    }
}
