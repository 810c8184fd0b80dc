pub mod account;
pub mod fields;
pub mod tasks;

use std::error::Error;

use tasklock::config::RuntimeConfig;
use tasklock::credentials::CredentialStore;
use tasklock::store::EncryptedPreferences;
use tasklock::tasks::{JsonTaskBackend, SecureTaskRepository};

pub type Repository<'a> = SecureTaskRepository<'a, JsonTaskBackend, EncryptedPreferences>;

/// Opened stores for one CLI invocation.
pub struct Context {
    pub config: RuntimeConfig,
    pub credentials: CredentialStore<EncryptedPreferences>,
}

impl Context {
    pub fn open(config: RuntimeConfig) -> Result<Self, Box<dyn Error>> {
        let prefs = EncryptedPreferences::open(config.preferences_path(), &config.vault)?;
        let credentials = CredentialStore::new(prefs, config.password_scheme);
        Ok(Self { config, credentials })
    }

    pub fn repository(&self) -> Result<Repository<'_>, Box<dyn Error>> {
        let backend = JsonTaskBackend::open(self.config.tasks_path())?;
        Ok(SecureTaskRepository::new(backend, &self.credentials, &self.config.vault))
    }
}

/// Context over a scratch directory with a fixed vault key.
#[cfg(test)]
pub fn scratch_context(dir: &std::path::Path) -> Context {
    use tasklock::crypto::passwords::PasswordScheme;
    use tasklock::crypto::secrets::SecretVault;

    let config = RuntimeConfig {
        vault: SecretVault::from_key_bytes(&[21u8; 32]).unwrap(),
        data_dir: dir.to_path_buf(),
        password_scheme: PasswordScheme::Sha256,
        debug_level: None,
    };
    Context::open(config).unwrap()
}
