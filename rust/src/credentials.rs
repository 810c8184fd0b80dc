//! The installation's single credential record and its logged-in flag.
//!
//! Registering replaces whatever record was there before. Absent values read
//! as `None`/`false`; only storage failures surface as errors.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::passwords::{hash_password, needs_rehash, verify_password, PasswordError, PasswordScheme};
use crate::store::{Edit, PreferenceStore, StoreError};

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const FULL_NAME_KEY: &str = "fullName";
pub const LOGGED_IN_KEY: &str = "isLoggedIn";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential storage failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

pub struct CredentialStore<S: PreferenceStore> {
    prefs: S,
    scheme: PasswordScheme,
}

impl<S: PreferenceStore> CredentialStore<S> {
    pub fn new(prefs: S, scheme: PasswordScheme) -> Self {
        Self { prefs, scheme }
    }

    /// Writes a fresh record with `logged_in = false`, overwriting any
    /// previous registration.
    pub fn register(&mut self, username: &str, password: &str, display_name: &str) -> Result<(), CredentialError> {
        let digest = hash_password(self.scheme, password)?;
        self.prefs.commit(vec![
            Edit::put_string(USERNAME_KEY, username),
            Edit::put_string(PASSWORD_KEY, &digest),
            Edit::put_string(FULL_NAME_KEY, display_name),
            Edit::put_bool(LOGGED_IN_KEY, false),
        ])?;
        info!(username, "registered credentials");
        Ok(())
    }

    /// True when both the username and the password digest match the record.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialError> {
        let stored_username = self.prefs.get_string(USERNAME_KEY)?;
        let stored_digest = self.prefs.get_string(PASSWORD_KEY)?;
        let (Some(stored_username), Some(stored_digest)) = (stored_username, stored_digest) else {
            return Ok(false);
        };
        Ok(stored_username == username && verify_password(password, &stored_digest))
    }

    /// Verifies and, on success, marks the record logged in. A digest in a
    /// scheme other than the configured one is upgraded in the same write.
    pub fn login(&mut self, username: &str, password: &str) -> Result<bool, CredentialError> {
        if !self.verify(username, password)? {
            warn!(username, "login rejected");
            return Ok(false);
        }

        let mut edits = vec![Edit::put_bool(LOGGED_IN_KEY, true)];
        if let Some(stored_digest) = self.prefs.get_string(PASSWORD_KEY)? {
            if needs_rehash(&stored_digest, self.scheme) {
                debug!(username, scheme = ?self.scheme, "upgrading stored password digest");
                edits.push(Edit::put_string(PASSWORD_KEY, &hash_password(self.scheme, password)?));
            }
        }
        self.prefs.commit(edits)?;
        info!(username, "logged in");
        Ok(true)
    }

    pub fn set_logged_in(&mut self, logged_in: bool) -> Result<(), CredentialError> {
        self.prefs.put_bool(LOGGED_IN_KEY, logged_in)?;
        Ok(())
    }

    pub fn is_logged_in(&self) -> Result<bool, CredentialError> {
        Ok(self.prefs.get_bool(LOGGED_IN_KEY, false)?)
    }

    pub fn logout(&mut self) -> Result<(), CredentialError> {
        self.set_logged_in(false)?;
        info!("logged out");
        Ok(())
    }

    pub fn has_credentials(&self) -> Result<bool, CredentialError> {
        let username = self.prefs.get_string(USERNAME_KEY)?.unwrap_or_default();
        let digest = self.prefs.get_string(PASSWORD_KEY)?.unwrap_or_default();
        Ok(!username.is_empty() && !digest.is_empty())
    }

    pub fn username(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.prefs.get_string(USERNAME_KEY)?)
    }

    pub fn display_name(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.prefs.get_string(FULL_NAME_KEY)?)
    }

    /// The signed-in username, or `None` while logged out.
    pub fn principal(&self) -> Result<Option<String>, CredentialError> {
        if !self.is_logged_in()? {
            return Ok(None);
        }
        Ok(self.username()?.filter(|name| !name.is_empty()))
    }

    /// Wipes the whole preference namespace, not just the credential keys.
    pub fn clear_all(&mut self) -> Result<(), CredentialError> {
        self.prefs.clear()?;
        info!("cleared credential store");
        Ok(())
    }

    pub fn preferences(&self) -> &S {
        &self.prefs
    }
}
