//! Domain layer
//!
//! Plain identifier types shared by the storage, auth and API layers.

pub mod id;

pub use id::{ResetTicketId, UserId};
