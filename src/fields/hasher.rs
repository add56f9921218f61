//! Salted, cost-tunable one-way hashing for field secrets.
//!
//! Secrets are stored as Argon2id PHC strings. Verification reads the cost
//! parameters from the stored digest, so raising the configured cost does not
//! invalidate secrets hashed under the old parameters.

use super::error::{FieldError, Result};
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{error, warn};

// Hashed once per hasher. Comparisons against it are always discarded.
const DECOY_SECRET: &str = "fieldgate-decoy-secret";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    /// Argon2id defaults: ~19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashParams {
    /// Cheap parameters for tests. Never use these for real secrets.
    #[must_use]
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
    // Digest with the configured cost, compared against when a field has no
    // secret so both paths take the same time.
    decoy: Arc<str>,
    verifications: Arc<AtomicU64>,
}

impl CredentialHasher {
    /// # Errors
    /// Returns `InvalidInput` if Argon2 rejects the cost parameters.
    pub fn new(params: HashParams) -> Result<Self> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|err| FieldError::invalid(format!("invalid argon2 parameters: {err}")))?;
        let decoy = hash_with(&argon2(&params), DECOY_SECRET)?;
        Ok(Self {
            params,
            decoy: decoy.into(),
            verifications: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Hash a secret into a PHC string with a fresh random salt.
    ///
    /// # Errors
    /// Returns `Hashing` if Argon2 fails.
    pub fn hash(&self, secret: &str) -> Result<String> {
        hash_with(&argon2(&self.params), secret)
    }

    /// Number of digest comparisons run by this hasher and its clones.
    #[must_use]
    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    /// Salt-aware comparison. A malformed digest is a non-match.
    #[must_use]
    pub fn verify(&self, candidate: &str, digest: &str) -> bool {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Stored secret hash is malformed: {err}");
                return false;
            }
        };
        argon2(&self.params)
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    /// Returns `Hashing` if Argon2 fails or the blocking task is lost.
    pub async fn hash_blocking(&self, secret: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|err| FieldError::Hashing(format!("hash task failed: {err}")))?
    }

    /// [`Self::verify`] on the blocking pool. A lost task is a non-match.
    pub async fn verify_blocking(&self, candidate: String, digest: String) -> bool {
        let hasher = self.clone();
        match tokio::task::spawn_blocking(move || hasher.verify(&candidate, &digest)).await {
            Ok(matched) => matched,
            Err(err) => {
                error!("Verify task failed: {err}");
                false
            }
        }
    }

    /// Spend a full comparison without a real digest. Used for fields with no
    /// secret, which must not answer faster than a wrong guess.
    pub async fn verify_decoy_blocking(&self, candidate: String) {
        let digest = self.decoy.to_string();
        let _ = self.verify_blocking(candidate, digest).await;
    }
}

fn argon2(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn hash_with(argon2: &Argon2<'_>, secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| FieldError::Hashing(err.to_string()))
}
