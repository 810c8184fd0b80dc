//! Local key-value preferences.
//!
//! Writes go through [`PreferenceStore::commit`] as a batch so a multi-field
//! update (such as registering a credential record) lands all at once.
//! Missing keys read as `None` rather than as errors.

pub mod encrypted;
pub mod memory;

pub use encrypted::EncryptedPreferences;
pub use memory::MemoryPreferences;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::integrity::IntegrityError;
use crate::crypto::secrets::SecretVaultError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference file unreadable: {0}")]
    Io(String),
    #[error("preference file malformed: {0}")]
    Parse(String),
    #[error("preference value could not be decoded: {0}")]
    Value(String),
    #[error("vault error: {0}")]
    Vault(#[from] SecretVaultError),
    #[error("key tagging failed: {0}")]
    Integrity(#[from] IntegrityError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PrefValue {
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Put(String, PrefValue),
    Remove(String),
}

impl Edit {
    pub fn put_string(key: &str, value: &str) -> Self {
        Edit::Put(key.to_string(), PrefValue::String(value.to_string()))
    }

    pub fn put_bool(key: &str, value: bool) -> Self {
        Edit::Put(key.to_string(), PrefValue::Bool(value))
    }

    pub fn remove(key: &str) -> Self {
        Edit::Remove(key.to_string())
    }
}

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<PrefValue>, StoreError>;

    /// Applies every edit, in order, as one write.
    fn commit(&mut self, edits: Vec<Edit>) -> Result<(), StoreError>;

    /// Removes every key.
    fn clear(&mut self) -> Result<(), StoreError>;

    /// A boolean stored under `key` does not read as a string.
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(match self.get(key)? {
            Some(PrefValue::String(value)) => Some(value),
            _ => None,
        })
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        Ok(match self.get(key)? {
            Some(PrefValue::Bool(value)) => value,
            _ => default,
        })
    }

    fn put_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.commit(vec![Edit::put_string(key, value)])
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), StoreError> {
        self.commit(vec![Edit::put_bool(key, value)])
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.commit(vec![Edit::remove(key)])
    }
}
