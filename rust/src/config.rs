//! Configuration loader. The file names where the installation key comes
//! from and where data lives; it never holds key material itself.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::crypto::passwords::PasswordScheme;
use crate::crypto::secrets::{SecretVault, SecretVaultError, KEY_BASE64};

pub const CONFIG_ENV: &str = "TASKLOCK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tasklock.json";

const PREFERENCES_FILE: &str = "secure_prefs.json";
const TASKS_FILE: &str = "tasks.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("vault error: {0}")]
    Vault(#[from] SecretVaultError),
    #[error("passphrase unavailable: {0}")]
    Passphrase(String),
    #[error("no usable vault key source configured")]
    MissingKeySource,
}

/// Where the installation key comes from. The first configured source wins,
/// in field order.
#[derive(Debug, Default, Deserialize)]
pub struct VaultConfig {
    /// Environment variable holding a base64 32-byte key, padded or not.
    pub key_env: Option<String>,
    /// Key file; a random key is written there on first use.
    pub key_path: Option<PathBuf>,
    /// Environment variable holding a passphrase for Argon2id derivation.
    pub passphrase_env: Option<String>,
    /// Base64 salt used with the passphrase, padded or not.
    pub salt_b64: Option<String>,
}

impl VaultConfig {
    fn build_vault(&self, base: &Path) -> Result<SecretVault, ConfigError> {
        if let Some(var) = &self.key_env {
            return Ok(SecretVault::from_env_var(var)?);
        }
        if let Some(path) = &self.key_path {
            return Ok(SecretVault::load_or_create_key_file(&resolve(base, path))?);
        }
        if let (Some(pass_env), Some(salt_b64)) = (&self.passphrase_env, &self.salt_b64) {
            let passphrase = std::env::var(pass_env).map_err(|e| ConfigError::Passphrase(format!("{pass_env}: {e}")))?;
            let salt = KEY_BASE64
                .decode(salt_b64.as_bytes())
                .map_err(|e| ConfigError::Parse(format!("salt_b64: {e}")))?;
            return Ok(SecretVault::derive_from_passphrase(&passphrase, &salt)?);
        }
        Err(ConfigError::MissingKeySource)
    }
}

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub vault: VaultConfig,
    #[serde(rename = "dataDir")]
    pub data_dir: Option<PathBuf>,
    #[serde(rename = "passwordScheme", default)]
    pub password_scheme: PasswordScheme,
    #[serde(rename = "debugLevel")]
    pub debug_level: Option<String>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl RawConfig {
    /// Parses the file without touching any key source, so logging can be
    /// configured before the vault is opened.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw_json = fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let mut raw: RawConfig = serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;
        raw.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(raw)
    }

    /// Opens the vault and resolves paths relative to the config file.
    pub fn into_runtime(self) -> Result<RuntimeConfig, ConfigError> {
        let vault = self.vault.build_vault(&self.base_dir)?;
        let data_dir = match &self.data_dir {
            Some(dir) => resolve(&self.base_dir, dir),
            None => self.base_dir.clone(),
        };
        Ok(RuntimeConfig {
            vault,
            data_dir,
            password_scheme: self.password_scheme,
            debug_level: self.debug_level,
        })
    }
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub vault: SecretVault,
    pub data_dir: PathBuf,
    pub password_scheme: PasswordScheme,
    pub debug_level: Option<String>,
}

impl RuntimeConfig {
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE)
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    RawConfig::read(path)?.into_runtime()
}

/// The config path from an explicit argument, else `TASKLOCK_CONFIG`, else
/// `tasklock.json` in the working directory.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
