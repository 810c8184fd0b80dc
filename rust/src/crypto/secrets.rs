//! Installation vault built on ChaCha20-Poly1305.
//!
//! One 32-byte vault key per installation protects the preference store and
//! is the root from which per-user field keys are derived. Sealed data is
//! `nonce || ciphertext || tag`; [`EncryptedSecret`] is the same triple split
//! into base64 fields for JSON storage.

use std::fs;
use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::alphabet;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

use super::integrity::{hkdf_expand, IntegrityError};
use crate::fsio::write_atomically;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const SUBKEY_SALT: &[u8] = b"tasklock.vault.v1";

/// Standard alphabet for operator-supplied key and salt text. Writes without
/// `=` padding and reads either form, so `openssl rand -base64 32` output
/// loads as is.
pub const KEY_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum SecretVaultError {
    #[error("invalid key length; expected 32 bytes")]
    InvalidKeyLength,
    #[error("argon2 derivation failed: {0}")]
    DerivationFailed(String),
    #[error("subkey derivation failed: {0}")]
    Subkey(#[from] IntegrityError),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("key source unreadable: {0}")]
    KeySourceUnreadable(String),
    #[error("key file could not be written: {0}")]
    KeySourceUnwritable(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
}

/// Base64 envelope for a sealed value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedSecret {
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

pub struct SecretVault {
    key: Key,
}

impl SecretVault {
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, SecretVaultError> {
        if key_bytes.len() != KEY_LEN {
            return Err(SecretVaultError::InvalidKeyLength);
        }
        let mut key = Key::default();
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    /// Fresh random key from the OS generator.
    pub fn generate() -> Result<Self, SecretVaultError> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self::from_key_bytes(&bytes[..])
    }

    /// Reads a base64 key from an environment variable.
    pub fn from_env_var(var: &str) -> Result<Self, SecretVaultError> {
        let encoded = Zeroizing::new(
            std::env::var(var).map_err(|e| SecretVaultError::KeySourceUnreadable(format!("{var}: {e}")))?,
        );
        Self::from_base64(encoded.trim())
    }

    /// Reads a base64 key from disk.
    pub fn from_key_file(path: &Path) -> Result<Self, SecretVaultError> {
        let content = Zeroizing::new(
            fs::read_to_string(path)
                .map_err(|e| SecretVaultError::KeySourceUnreadable(format!("{}: {e}", path.display())))?,
        );
        Self::from_base64(content.trim())
    }

    /// Like [`Self::from_key_file`], but provisions a new random key at `path`
    /// on first use.
    pub fn load_or_create_key_file(path: &Path) -> Result<Self, SecretVaultError> {
        if path.exists() {
            return Self::from_key_file(path);
        }
        let vault = Self::generate()?;
        let encoded = Zeroizing::new(KEY_BASE64.encode(vault.key.as_slice()));
        write_atomically(path, encoded.as_bytes())
            .map_err(|e| SecretVaultError::KeySourceUnwritable(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "provisioned new installation key");
        Ok(vault)
    }

    /// Derives the vault key from a passphrase with Argon2id. The salt must be
    /// unique per installation.
    pub fn derive_from_passphrase(passphrase: &str, salt: &[u8]) -> Result<Self, SecretVaultError> {
        let params = Params::new(19 * 1024, 3, 1, Some(KEY_LEN))
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut output = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut output)
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))?;

        let vault = SecretVault::from_key_bytes(&output);
        output.zeroize();
        vault
    }

    fn from_base64(encoded: &str) -> Result<Self, SecretVaultError> {
        let decoded = Zeroizing::new(
            KEY_BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| SecretVaultError::Base64DecodeFailed(format!("{e}")))?,
        );
        Self::from_key_bytes(&decoded)
    }

    /// Expands independent key material for `purpose`. Distinct purposes
    /// yield unrelated keys; the vault key itself never leaves this type.
    pub fn subkey_material(&self, purpose: &[u8]) -> Result<Zeroizing<Vec<u8>>, SecretVaultError> {
        let okm = hkdf_expand(self.key.as_slice(), SUBKEY_SALT, purpose, KEY_LEN)?;
        Ok(Zeroizing::new(okm))
    }

    /// A vault keyed by [`Self::subkey_material`] for `purpose`.
    pub fn derive_subvault(&self, purpose: &[u8]) -> Result<SecretVault, SecretVaultError> {
        let material = self.subkey_material(purpose)?;
        SecretVault::from_key_bytes(&material)
    }

    /// Encrypts `plaintext` under a fresh random nonce. `context` is
    /// authenticated but not encrypted; the same bytes must be supplied to
    /// [`Self::open`].
    pub fn seal(&self, plaintext: &[u8], context: &[u8]) -> Result<Vec<u8>, SecretVaultError> {
        let cipher = ChaCha20Poly1305::new(&self.key);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext_and_tag = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad: context })
            .map_err(|e| SecretVaultError::EncryptionFailed(format!("{e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext_and_tag.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext_and_tag);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8], context: &[u8]) -> Result<Vec<u8>, SecretVaultError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(SecretVaultError::DecryptionFailed(
                "sealed data shorter than nonce and tag".to_string(),
            ));
        }
        let (nonce, ciphertext_and_tag) = sealed.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&self.key);
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext_and_tag, aad: context })
            .map_err(|e| SecretVaultError::DecryptionFailed(format!("{e}")))
    }

    pub fn encrypt_secret(&self, plaintext: &[u8], context: &[u8]) -> Result<EncryptedSecret, SecretVaultError> {
        let sealed = self.seal(plaintext, context)?;
        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        Ok(EncryptedSecret {
            nonce: STANDARD_NO_PAD.encode(nonce),
            ciphertext: STANDARD_NO_PAD.encode(ciphertext),
            tag: STANDARD_NO_PAD.encode(tag),
        })
    }

    pub fn decrypt_secret(&self, secret: &EncryptedSecret, context: &[u8]) -> Result<Vec<u8>, SecretVaultError> {
        let decode = |field: &str| {
            STANDARD_NO_PAD
                .decode(field.as_bytes())
                .map_err(|e| SecretVaultError::Base64DecodeFailed(format!("{e}")))
        };
        let nonce = decode(&secret.nonce)?;
        let ciphertext = decode(&secret.ciphertext)?;
        let tag = decode(&secret.tag)?;

        if nonce.len() != NONCE_LEN {
            return Err(SecretVaultError::DecryptionFailed("nonce length mismatch".to_string()));
        }
        if tag.len() != TAG_LEN {
            return Err(SecretVaultError::DecryptionFailed("tag length mismatch".to_string()));
        }

        let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len() + tag.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        sealed.extend_from_slice(&tag);
        self.open(&sealed, context)
    }
}

impl std::fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVault").field("key", &"<redacted>").finish()
    }
}

impl Drop for SecretVault {
    fn drop(&mut self) {
        self.key.as_mut_slice().zeroize();
    }
}
