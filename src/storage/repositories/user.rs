//! User directory: persistence for principals and their revocation counters.
//!
//! Counter changes are single `UPDATE ... RETURNING` statements so concurrent
//! revocations for one principal never lose an increment.

use crate::auth::user::{NewUser, Role, User, UserCredentials};
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::instrument;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, revocation_counter, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub revocation_counter: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> Result<UserCredentials> {
        let role = Role::from_str(&self.role)
            .map_err(|_| Error::internal(format!("Unknown role '{}' stored for user", self.role)))?;

        Ok(UserCredentials {
            user: User {
                id: UserId::new(self.id),
                name: self.name,
                email: self.email,
                role,
                revocation_counter: self.revocation_counter,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }

    fn into_user(self) -> Result<User> {
        self.into_credentials().map(|c| c.user)
    }
}

/// Lookup and mutation of principals.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Get a principal by ID
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Get a principal by exact email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get a principal and its password digest by email, for login
    async fn find_with_password(&self, email: &str) -> Result<Option<UserCredentials>>;

    /// Get a principal and its password digest by ID, for password change
    async fn find_credentials_by_id(&self, id: UserId) -> Result<Option<UserCredentials>>;

    /// Create a principal. Fails with a `user` conflict when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Replace the password digest without touching the revocation counter
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<()>;

    /// Atomically advance the revocation counter, returning the new value
    async fn increment_revocation_counter(&self, id: UserId) -> Result<i64>;

    /// Replace the password digest and advance the counter in one statement
    async fn rotate_password(&self, id: UserId, password_hash: &str) -> Result<i64>;

    /// Change a principal's role
    async fn update_role(&self, id: UserId, role: Role) -> Result<User>;

    /// Remove a principal. Its reset tickets go with it.
    async fn delete(&self, id: UserId) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxUserDirectory {
    pool: DbPool,
}

impl SqlxUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_row_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| Error::database(err, "Failed to fetch user by email"))
    }

    async fn fetch_row_by_id(&self, id: UserId) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| Error::database(err, "Failed to fetch user"))
    }
}

#[async_trait]
impl UserDirectory for SqlxUserDirectory {
    #[instrument(skip(self), fields(user_id = %id), name = "db_find_user_by_id")]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.fetch_row_by_id(id).await?.map(UserRow::into_user).transpose()
    }

    #[instrument(skip(self), fields(user_email = %email), name = "db_find_user_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_row_by_email(email).await?.map(UserRow::into_user).transpose()
    }

    #[instrument(skip(self), fields(user_email = %email), name = "db_find_user_with_password")]
    async fn find_with_password(&self, email: &str) -> Result<Option<UserCredentials>> {
        self.fetch_row_by_email(email).await?.map(UserRow::into_credentials).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_find_user_credentials")]
    async fn find_credentials_by_id(&self, id: UserId) -> Result<Option<UserCredentials>> {
        self.fetch_row_by_id(id).await?.map(UserRow::into_credentials).transpose()
    }

    #[instrument(skip(self, user), fields(user_email = %user.email, role = %user.role), name = "db_create_user")]
    async fn create(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, revocation_counter, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::conflict(format!("A user with email '{}' already exists", user.email), "user")
            }
            other => Error::database(other, "Failed to create user"),
        })?;

        row.into_user()
    }

    #[instrument(skip(self, password_hash), fields(user_id = %id), name = "db_update_password_hash")]
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|err| Error::database(err, "Failed to update password"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("user", id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_increment_revocation_counter")]
    async fn increment_revocation_counter(&self, id: UserId) -> Result<i64> {
        let counter: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET revocation_counter = revocation_counter + 1, updated_at = ?
            WHERE id = ?
            RETURNING revocation_counter
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to increment revocation counter"))?;

        counter.ok_or_else(|| Error::not_found("user", id.to_string()))
    }

    #[instrument(skip(self, password_hash), fields(user_id = %id), name = "db_rotate_password")]
    async fn rotate_password(&self, id: UserId, password_hash: &str) -> Result<i64> {
        let counter: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = ?, revocation_counter = revocation_counter + 1, updated_at = ?
            WHERE id = ?
            RETURNING revocation_counter
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to rotate password"))?;

        counter.ok_or_else(|| Error::not_found("user", id.to_string()))
    }

    #[instrument(skip(self), fields(user_id = %id, role = %role), name = "db_update_user_role")]
    async fn update_role(&self, id: UserId, role: Role) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = ?, updated_at = ? WHERE id = ? RETURNING {}",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to update user role"))?;

        row.ok_or_else(|| Error::not_found("user", id.to_string()))?.into_user()
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_delete_user")]
    async fn delete(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| Error::database(err, "Failed to delete user"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("user", id.to_string()));
        }

        Ok(())
    }
}
