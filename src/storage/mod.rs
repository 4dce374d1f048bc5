//! # Storage and Persistence
//!
//! SQLite connectivity, embedded migrations and the repositories backing the
//! user directory, reset tickets and the audit log.

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub mod test_helpers;

pub use crate::config::DatabaseConfig;

pub use migrations::{list_applied_migrations, validate_migrations, MigrationInfo};
pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};
pub use repositories::{
    AuditEvent, AuditLogRepository, ResetTicketStore, SqlxResetTicketStore, SqlxUserDirectory,
    UserDirectory,
};

use crate::errors::{Error, Result};

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::database(e, "Database connectivity check failed"))?;

    Ok(())
}
