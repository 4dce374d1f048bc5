//! Session token signing.
//!
//! Tokens are HS256 JWTs carrying the principal id (`uid`) and the principal's
//! revocation counter at mint time (`tv`). The signing key is loaded once into an
//! immutable [`SigningConfig`] and shared by the issuer and the validator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::models::IssuedToken;
use crate::config::AuthConfig;
use crate::domain::UserId;
use crate::errors::{Error, Result};

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Principal id
    pub uid: i64,
    /// Revocation counter snapshot
    pub tv: i64,
    /// Issued at, epoch seconds
    pub iat: i64,
    /// Expiry, epoch seconds
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> UserId {
        UserId::new(self.uid)
    }
}

/// Immutable signing material plus the default session lifetime.
#[derive(Clone)]
pub struct SigningConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl_seconds: u64,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("algorithm", &"HS256")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl SigningConfig {
    /// Build signing material from a raw secret. An empty secret is fatal.
    pub fn new(secret: &[u8], token_ttl_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::config("JWT signing secret must not be empty"));
        }

        // Expiry is enforced by the validator against its own clock with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            token_ttl_seconds,
        })
    }

    pub fn from_auth_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.jwt_secret.as_bytes(), config.token_expiry_seconds)
    }

    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_seconds
    }

    /// Verify signature and structure only.
    pub fn decode(&self, token: &str) -> std::result::Result<SessionClaims, jsonwebtoken::errors::Error> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }

    fn encode(&self, claims: &SessionClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("Failed to sign session token: {}", e)))
    }
}

/// Mints session tokens.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    signing: Arc<SigningConfig>,
}

impl TokenIssuer {
    pub fn new(signing: Arc<SigningConfig>) -> Self {
        Self { signing }
    }

    /// Mint a token with the configured lifetime.
    pub fn issue_default(&self, user_id: UserId, revocation_counter: i64) -> Result<IssuedToken> {
        self.issue(user_id, revocation_counter, self.signing.token_ttl_seconds)
    }

    pub fn issue(
        &self,
        user_id: UserId,
        revocation_counter: i64,
        ttl_seconds: u64,
    ) -> Result<IssuedToken> {
        self.issue_at(Utc::now(), user_id, revocation_counter, ttl_seconds)
    }

    /// Mint a token as of `now`.
    pub fn issue_at(
        &self,
        now: DateTime<Utc>,
        user_id: UserId,
        revocation_counter: i64,
        ttl_seconds: u64,
    ) -> Result<IssuedToken> {
        let ttl = i64::try_from(ttl_seconds)
            .map_err(|_| Error::validation_field("Token lifetime is too large", "ttl_seconds"))?;
        let iat = now.timestamp();
        let exp = iat
            .checked_add(ttl)
            .ok_or_else(|| Error::validation_field("Token lifetime is too large", "ttl_seconds"))?;

        let claims = SessionClaims { uid: user_id.get(), tv: revocation_counter, iat, exp };
        let token = self.signing.encode(&claims)?;
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| Error::internal("Token expiry is out of range"))?;

        Ok(IssuedToken { token, expires_at })
    }
}

#[cfg(test)]
pub(crate) fn test_signing_config() -> Arc<SigningConfig> {
    Arc::new(SigningConfig::new(b"test-secret-key-for-sessionward-tests", 3600).unwrap())
}
