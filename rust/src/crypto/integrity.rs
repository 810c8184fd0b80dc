//! Digest and key-derivation primitives shared by the password, vault, and
//! preference layers. Nothing here touches storage.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("hkdf expansion failed: {0}")]
    HkdfFailed(String),
    #[error("hmac failed: {0}")]
    HmacFailed(String),
}

type HmacSha256 = Hmac<Sha256>;

/// Raw SHA-256 digest of `data`.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 digest. This is the stored form of legacy
/// (unsalted) password records.
pub fn sha256_hex(data: &[u8]) -> String {
    to_hex(&sha256_digest(data))
}

/// HMAC-SHA256 tag over `data`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, IntegrityError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| IntegrityError::HmacFailed(format!("{e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex form of [`hmac_sha256`]; used to blind preference key names on disk.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> Result<String, IntegrityError> {
    hmac_sha256(key, data).map(|tag| to_hex(&tag))
}

/// Derives `length` bytes of key material using HKDF-SHA256.
pub fn hkdf_expand(
    input_key_material: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>, IntegrityError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), input_key_material);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|e| IntegrityError::HkdfFailed(format!("{e}")))?;
    Ok(okm)
}

/// Compares two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
