//! Repository modules for data access
//!
//! Each repository owns the SQL for one table and exposes it through an
//! `async_trait` contract so services can be tested against any implementation.

pub mod audit_log;
pub mod reset_ticket;
pub mod user;

pub use audit_log::{AuditEvent, AuditLogEntry, AuditLogRepository};
pub use reset_ticket::{digest_ticket_token, ResetTicketStore, SqlxResetTicketStore};
pub use user::{SqlxUserDirectory, UserDirectory};
