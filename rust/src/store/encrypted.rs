//! File-backed encrypted preferences.
//!
//! On disk every key name is replaced by an HMAC tag and every value is a
//! ChaCha20-Poly1305 envelope bound to that tag, so entries cannot be read,
//! and cannot be swapped between keys, without the installation key.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::{Edit, PrefValue, PreferenceStore, StoreError};
use crate::crypto::integrity::hmac_sha256_hex;
use crate::crypto::secrets::{EncryptedSecret, SecretVault};
use crate::fsio::write_atomically;

const FORMAT_VERSION: u32 = 1;
const KEY_TAG_PURPOSE: &[u8] = b"tasklock/prefs/keys";
const VALUE_PURPOSE: &[u8] = b"tasklock/prefs/values";

#[derive(Debug, Serialize, Deserialize)]
struct PreferenceFile {
    version: u32,
    entries: BTreeMap<String, EncryptedSecret>,
}

pub struct EncryptedPreferences {
    path: PathBuf,
    values: SecretVault,
    key_tag_key: Zeroizing<Vec<u8>>,
    entries: BTreeMap<String, EncryptedSecret>,
}

impl EncryptedPreferences {
    /// Opens the preference file at `path`, or starts empty if it does not
    /// exist yet. The file is only created on the first commit.
    pub fn open(path: impl AsRef<Path>, installation: &SecretVault) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
            let file: PreferenceFile =
                serde_json::from_str(&raw).map_err(|e| StoreError::Parse(format!("{}: {e}", path.display())))?;
            if file.version != FORMAT_VERSION {
                return Err(StoreError::Parse(format!(
                    "{}: unsupported version {}",
                    path.display(),
                    file.version
                )));
            }
            file.entries
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "opened preference file");

        Ok(Self {
            path,
            values: installation.derive_subvault(VALUE_PURPOSE)?,
            key_tag_key: installation.subkey_material(KEY_TAG_PURPOSE)?,
            entries,
        })
    }

    fn tag(&self, key: &str) -> Result<String, StoreError> {
        Ok(hmac_sha256_hex(&self.key_tag_key, key.as_bytes())?)
    }

    fn persist(&self, entries: &BTreeMap<String, EncryptedSecret>) -> Result<(), StoreError> {
        let file = PreferenceFile {
            version: FORMAT_VERSION,
            entries: entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| StoreError::Parse(format!("{e}")))?;
        write_atomically(&self.path, &bytes).map_err(|e| StoreError::Io(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), entries = entries.len(), "wrote preference file");
        Ok(())
    }
}

impl PreferenceStore for EncryptedPreferences {
    fn get(&self, key: &str) -> Result<Option<PrefValue>, StoreError> {
        let tag = self.tag(key)?;
        let Some(envelope) = self.entries.get(&tag) else {
            return Ok(None);
        };
        let plaintext = Zeroizing::new(self.values.decrypt_secret(envelope, tag.as_bytes())?);
        let value = serde_json::from_slice(&plaintext).map_err(|e| StoreError::Value(format!("{key}: {e}")))?;
        Ok(Some(value))
    }

    fn commit(&mut self, edits: Vec<Edit>) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        for edit in edits {
            match edit {
                Edit::Put(key, value) => {
                    let tag = self.tag(&key)?;
                    let plaintext = Zeroizing::new(
                        serde_json::to_vec(&value).map_err(|e| StoreError::Value(format!("{key}: {e}")))?,
                    );
                    let envelope = self.values.encrypt_secret(&plaintext, tag.as_bytes())?;
                    next.insert(tag, envelope);
                }
                Edit::Remove(key) => {
                    next.remove(&self.tag(&key)?);
                }
            }
        }
        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let empty = BTreeMap::new();
        self.persist(&empty)?;
        self.entries = empty;
        Ok(())
    }
}
