//! Authentication and authorization module entry point.
//!
//! Password hashing, session token issue and validation, counter-based revocation,
//! password reset tickets and role checks, plus the axum middleware that wires the
//! validator and the role gate into the HTTP layer.

pub mod authorization;
pub mod hashing;
pub mod jwt;
pub mod login_service;
pub mod middleware;
pub mod models;
pub mod password_reset;
pub mod revocation;
pub mod user;
pub mod user_service;
pub mod user_validation;
pub mod validation;

pub use authorization::AuthorizationGate;
pub use hashing::CredentialHasher;
pub use jwt::{SessionClaims, SigningConfig, TokenIssuer};
pub use login_service::{ClientInfo, LoginService, Registration};
pub use models::{AuthContext, AuthOutcome, IssuedResetTicket, IssuedToken, ResetTicket};
pub use password_reset::{PasswordResetFlow, ResetTicketDelivery, TracingResetDelivery};
pub use revocation::{RevocationController, RevocationTrigger};
pub use user::{Role, User};
pub use user_service::UserService;
pub use user_validation::PasswordPolicy;
pub use validation::TokenValidator;
