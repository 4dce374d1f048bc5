//! Validation helpers for credential input.

use validator::ValidationError;

use crate::errors::{Error, Result};

/// Longest accepted password, in bytes.
const MAX_PASSWORD_LENGTH: usize = 1024;

/// Minimum display name length, in characters
pub const MIN_NAME_LENGTH: usize = 2;

/// Length policy applied to every new password (registration, change, reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Check `password` against the policy, naming `field` in the error.
    pub fn check(&self, password: &str, field: &str) -> Result<()> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(Error::validation_field(
                format!("{}: must be at least {} characters", field, self.min_length),
                field,
            ));
        }
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(Error::validation_field(
                format!("{}: must be at most {} bytes", field, MAX_PASSWORD_LENGTH),
                field,
            ));
        }
        Ok(())
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 6 }
    }
}

/// Validate user name (at least two visible characters, reasonable length)
pub fn validate_user_name(name: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::new("name_too_short"));
    }

    if trimmed.len() > 255 {
        return Err(ValidationError::new("name_too_long"));
    }

    Ok(())
}
