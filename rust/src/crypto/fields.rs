//! Field cipher for task text.
//!
//! Each user gets a key derived from the installation vault, so the same
//! title stored by two users (or two installs) produces unrelated
//! ciphertext. Wire form: `enc1:` followed by standard base64 of
//! `nonce || ciphertext || tag`.

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tracing::warn;

use super::secrets::{SecretVault, SecretVaultError};

pub const FIELD_PREFIX: &str = "enc1:";
const FIELD_KEY_PURPOSE: &str = "tasklock/fields/v1:";

#[derive(Debug, Error)]
pub enum FieldCipherError {
    #[error("field key unavailable: {0}")]
    Key(SecretVaultError),
    #[error("not a field ciphertext")]
    NotCiphertext,
    #[error("field ciphertext is not valid base64: {0}")]
    Encoding(String),
    #[error("field encryption failed: {0}")]
    Encrypt(SecretVaultError),
    #[error("field decryption failed: {0}")]
    Decrypt(SecretVaultError),
    #[error("decrypted field is not utf-8")]
    Utf8,
}

#[derive(Debug)]
pub struct FieldCipher {
    vault: SecretVault,
}

impl FieldCipher {
    /// Cipher for fields owned by `user_id` on this installation.
    pub fn for_user(installation: &SecretVault, user_id: &str) -> Result<Self, FieldCipherError> {
        let purpose = format!("{FIELD_KEY_PURPOSE}{user_id}");
        let vault = installation
            .derive_subvault(purpose.as_bytes())
            .map_err(FieldCipherError::Key)?;
        Ok(Self { vault })
    }

    pub fn from_key_bytes(key: &[u8]) -> Result<Self, FieldCipherError> {
        let vault = SecretVault::from_key_bytes(key).map_err(FieldCipherError::Key)?;
        Ok(Self { vault })
    }

    /// Empty input stays empty.
    pub fn encrypt_field(&self, text: &str) -> Result<String, FieldCipherError> {
        self.encrypt_slot(text, "")
    }

    pub fn decrypt_field(&self, ciphertext: &str) -> Result<String, FieldCipherError> {
        self.decrypt_slot(ciphertext, "")
    }

    pub fn decrypt_field_lenient(&self, text: &str) -> String {
        self.decrypt_slot_lenient(text, "")
    }

    /// Encrypts `text` bound to `slot`, the place it is stored in (for tasks,
    /// `<task id>/<field>`). It only decrypts under the same slot.
    pub fn encrypt_slot(&self, text: &str, slot: &str) -> Result<String, FieldCipherError> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let sealed = self
            .vault
            .seal(text.as_bytes(), &slot_context(slot))
            .map_err(FieldCipherError::Encrypt)?;
        Ok(format!("{FIELD_PREFIX}{}", STANDARD.encode(sealed)))
    }

    pub fn decrypt_slot(&self, ciphertext: &str, slot: &str) -> Result<String, FieldCipherError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }
        let encoded = ciphertext
            .strip_prefix(FIELD_PREFIX)
            .ok_or(FieldCipherError::NotCiphertext)?;
        let sealed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| FieldCipherError::Encoding(format!("{e}")))?;
        let plaintext = self
            .vault
            .open(&sealed, &slot_context(slot))
            .map_err(FieldCipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| FieldCipherError::Utf8)
    }

    /// Decrypts `text`, or returns it unchanged when it is not a readable
    /// field ciphertext for `slot`. Only for reading records that may predate
    /// encryption; the fallback is logged.
    pub fn decrypt_slot_lenient(&self, text: &str, slot: &str) -> String {
        match self.decrypt_slot(text, slot) {
            Ok(plaintext) => plaintext,
            Err(FieldCipherError::NotCiphertext) => text.to_string(),
            Err(err) => {
                warn!(error = %err, slot, "field could not be decrypted; returning stored value");
                text.to_string()
            }
        }
    }
}

fn slot_context(slot: &str) -> Vec<u8> {
    format!("{FIELD_PREFIX}{slot}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::{FieldCipher, FieldCipherError, FIELD_PREFIX};
    use crate::crypto::secrets::SecretVault;

    fn cipher() -> FieldCipher {
        FieldCipher::from_key_bytes(&[3u8; 32]).expect("valid key")
    }

    #[test]
    fn round_trips_text_fields() {
        let cipher = cipher();
        for text in ["Buy milk", "Llamar al médico 📞", " padded  ", "a"] {
            let encrypted = cipher.encrypt_field(text).expect("encrypt");
            assert!(encrypted.starts_with(FIELD_PREFIX));
            if text.len() > 3 {
                assert!(!encrypted.contains(text.trim()));
            }
            assert_eq!(cipher.decrypt_field(&encrypted).expect("decrypt"), text);
        }
    }

    #[test]
    fn empty_fields_pass_through() {
        let cipher = cipher();
        assert_eq!(cipher.encrypt_field("").unwrap(), "");
        assert_eq!(cipher.decrypt_field("").unwrap(), "");
    }

    #[test]
    fn same_text_encrypts_differently_each_time() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt_field("Buy milk").unwrap(), cipher.encrypt_field("Buy milk").unwrap());
    }

    #[test]
    fn rejects_plaintext_strictly_and_passes_it_leniently() {
        let cipher = cipher();
        assert!(matches!(cipher.decrypt_field("Buy milk"), Err(FieldCipherError::NotCiphertext)));
        assert_eq!(cipher.decrypt_field_lenient("Buy milk"), "Buy milk");
        assert_eq!(cipher.decrypt_field_lenient("bm90IGNpcGhlcnRleHQ="), "bm90IGNpcGhlcnRleHQ=");
    }

    #[test]
    fn damaged_ciphertext_falls_back_to_stored_value() {
        let cipher = cipher();
        let garbage = format!("{FIELD_PREFIX}!!not base64!!");
        assert!(matches!(cipher.decrypt_field(&garbage), Err(FieldCipherError::Encoding(_))));
        assert_eq!(cipher.decrypt_field_lenient(&garbage), garbage);

        let short = format!("{FIELD_PREFIX}AAAA");
        assert!(matches!(cipher.decrypt_field(&short), Err(FieldCipherError::Decrypt(_))));
        assert_eq!(cipher.decrypt_field_lenient(&short), short);
    }

    #[test]
    fn keys_are_per_user() {
        let installation = SecretVault::from_key_bytes(&[5u8; 32]).unwrap();
        let alice = FieldCipher::for_user(&installation, "alice").unwrap();
        let bob = FieldCipher::for_user(&installation, "bob").unwrap();

        let encrypted = alice.encrypt_field("secret plans").unwrap();
        assert_eq!(alice.decrypt_field(&encrypted).unwrap(), "secret plans");
        assert!(matches!(bob.decrypt_field(&encrypted), Err(FieldCipherError::Decrypt(_))));
        assert_eq!(bob.decrypt_field_lenient(&encrypted), encrypted);
    }

    #[test]
    fn ciphertext_is_bound_to_its_slot() {
        let cipher = cipher();
        let title = cipher.encrypt_slot("Pay rent", "t1/title").unwrap();
        assert_eq!(cipher.decrypt_slot(&title, "t1/title").unwrap(), "Pay rent");
        assert!(matches!(cipher.decrypt_slot(&title, "t1/description"), Err(FieldCipherError::Decrypt(_))));
        assert!(matches!(cipher.decrypt_slot(&title, "t2/title"), Err(FieldCipherError::Decrypt(_))));
        assert!(matches!(cipher.decrypt_field(&title), Err(FieldCipherError::Decrypt(_))));
        assert_eq!(cipher.decrypt_slot_lenient(&title, "t2/title"), title);
    }
}
