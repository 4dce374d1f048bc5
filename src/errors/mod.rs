//! # Error Handling
//!
//! Typed errors for every sessionward component. The HTTP boundary maps them to a
//! uniform response envelope in [`crate::api::error`].

pub mod types;

pub use types::{AuthErrorType, Error, Result, TicketRejection};
