//! Password digests for the credential record.
//!
//! New records are hashed with Argon2id and stored as PHC strings. Records
//! written by older installs hold an unsalted SHA-256 hex digest; those still
//! verify, and [`needs_rehash`] tells the caller to upgrade them.

use argon2::password_hash::SaltString;
use argon2::{password_hash, Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::integrity::{constant_time_eq, sha256_hex};

/// 19 MiB, 3 passes, single lane.
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 3;
const PARALLELISM: u32 = 1;

const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    HashFailed(String),
}

impl From<password_hash::Error> for PasswordError {
    fn from(err: password_hash::Error) -> Self {
        PasswordError::HashFailed(format!("{err}"))
    }
}

/// Digest format written for newly registered credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    #[default]
    Argon2id,
    /// Unsalted lowercase hex SHA-256. Kept for compatibility with existing records.
    Sha256,
}

fn argon2_config() -> Result<Argon2<'static>, password_hash::Error> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `plaintext` with the given scheme and returns the string to persist.
pub fn hash_password(scheme: PasswordScheme, plaintext: &str) -> Result<String, PasswordError> {
    match scheme {
        PasswordScheme::Argon2id => {
            let salt = SaltString::generate(&mut OsRng);
            let argon2 = argon2_config()?;
            Ok(argon2.hash_password(plaintext.as_bytes(), &salt)?.to_string())
        }
        PasswordScheme::Sha256 => Ok(sha256_hex(plaintext.as_bytes())),
    }
}

/// Identifies which scheme produced a stored digest, if any.
pub fn detect_scheme(stored: &str) -> Option<PasswordScheme> {
    if stored.starts_with("$argon2") {
        Some(PasswordScheme::Argon2id)
    } else if stored.len() == SHA256_HEX_LEN && stored.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(PasswordScheme::Sha256)
    } else {
        None
    }
}

/// Recomputes the digest of `plaintext` and compares it against `stored`.
/// Unrecognized or malformed digests never match.
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    match detect_scheme(stored) {
        Some(PasswordScheme::Argon2id) => {
            let parsed_hash = match PasswordHash::new(stored) {
                Ok(hash) => hash,
                Err(_) => return false,
            };
            match argon2_config() {
                Ok(argon2) => argon2.verify_password(plaintext.as_bytes(), &parsed_hash).is_ok(),
                Err(_) => false,
            }
        }
        Some(PasswordScheme::Sha256) => {
            let computed = sha256_hex(plaintext.as_bytes());
            constant_time_eq(computed.as_bytes(), stored.to_ascii_lowercase().as_bytes())
        }
        None => false,
    }
}

/// True when `stored` was not produced by `preferred`.
pub fn needs_rehash(stored: &str, preferred: PasswordScheme) -> bool {
    detect_scheme(stored) != Some(preferred)
}
