//! Role-based authorization.
//!
//! The gate only ever runs on a context produced by the token validator, so an
//! unauthenticated request is rejected as unauthorized before any role check.

use tracing::warn;

use crate::auth::models::{AuthContext, AuthOutcome};
use crate::auth::user::{Role, User};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Fail with a forbidden error unless `user` holds exactly the `required` role.
    pub fn require_role(user: &User, required: Role) -> Result<()> {
        if user.role == required {
            return Ok(());
        }

        warn!(
            user_id = %user.id,
            role = %user.role,
            required = %required,
            "role check failed"
        );
        Err(Error::forbidden(format!("{} role required", required)))
    }

    /// Turn an authentication result into a request outcome, checking `required`
    /// only when authentication succeeded.
    ///
    /// Errors that are not authentication failures (a store outage, say) are
    /// passed through unchanged.
    pub fn narrow(
        authenticated: Result<AuthContext>,
        required: Option<Role>,
    ) -> Result<AuthOutcome> {
        match authenticated {
            Ok(ctx) => match required.map(|role| Self::require_role(&ctx.user, role)) {
                None | Some(Ok(())) => Ok(AuthOutcome::Accepted(ctx)),
                Some(Err(_)) => Ok(AuthOutcome::Forbidden),
            },
            Err(Error::Auth { error_type, .. }) => Ok(AuthOutcome::Unauthorized(error_type)),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::errors::AuthErrorType;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            id: UserId::new(1),
            name: "Gate".into(),
            email: "gate@example.com".into(),
            role,
            revocation_counter: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn role_must_match_exactly() {
        assert!(AuthorizationGate::require_role(&user(Role::Admin), Role::Admin).is_ok());
        assert!(AuthorizationGate::require_role(&user(Role::User), Role::User).is_ok());

        let err = AuthorizationGate::require_role(&user(Role::Admin), Role::User).unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
    }

    #[test]
    fn user_is_forbidden_from_admin() {
        let err = AuthorizationGate::require_role(&user(Role::User), Role::Admin).unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn narrow_maps_outcomes() {
        let accepted =
            AuthorizationGate::narrow(Ok(AuthContext::new(user(Role::Admin))), Some(Role::Admin))
                .unwrap();
        assert!(matches!(accepted, AuthOutcome::Accepted(ctx) if ctx.role() == Role::Admin));

        let forbidden =
            AuthorizationGate::narrow(Ok(AuthContext::new(user(Role::User))), Some(Role::Admin))
                .unwrap();
        assert!(matches!(forbidden, AuthOutcome::Forbidden));

        let unauthorized = AuthorizationGate::narrow(
            Err(Error::auth("expired", AuthErrorType::Expired)),
            Some(Role::Admin),
        )
        .unwrap();
        assert!(matches!(unauthorized, AuthOutcome::Unauthorized(AuthErrorType::Expired)));

        assert!(AuthorizationGate::narrow(Err(Error::internal("db down")), None).is_err());
    }

    #[test]
    fn narrow_without_requirement_accepts_any_role() {
        for role in [Role::User, Role::Admin] {
            let outcome = AuthorizationGate::narrow(Ok(AuthContext::new(user(role))), None).unwrap();
            assert!(matches!(outcome, AuthOutcome::Accepted(_)));
        }
    }
}
