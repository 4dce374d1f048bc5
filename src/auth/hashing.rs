//! Argon2id password hashing.
//!
//! Hashing is CPU and memory bound, so the async helpers move the work onto the
//! blocking pool instead of stalling a runtime worker.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::config::HashingConfig;
use crate::errors::{Error, Result};

const OUTPUT_LEN: usize = 32;

/// Produces and checks salted Argon2id digests in PHC string format.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(config: &HashingConfig) -> Result<Self> {
        let params =
            Params::new(config.memory_kib, config.iterations, config.parallelism, Some(OUTPUT_LEN))
                .map_err(|e| Error::config(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `plaintext` with a fresh random salt. Empty input is hashed like any other.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::internal(format!("Failed to hash password: {}", e)))
    }

    /// Constant-time check of `plaintext` against `digest`. A digest that does not
    /// parse simply fails verification.
    pub fn verify(&self, digest: &str, plaintext: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self.argon2().verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plaintext: Zeroizing<String>) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| Error::internal(format!("Password hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(&self, digest: String, plaintext: Zeroizing<String>) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &plaintext))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    CredentialHasher::new(&HashingConfig { memory_kib: 256, iterations: 1, parallelism: 1 })
        .unwrap()
}
