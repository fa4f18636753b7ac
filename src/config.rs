//! Configuration loading.
//!
//! Reads `config.json` from the config directory, then applies environment
//! overrides. Secrets (VAPID keys, JWT secret) are accepted from the file or
//! the environment but never written back out.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::notifications::vapid::VapidKeyPair;

const CONFIG_FILE: &str = "config.json";

/// Which subscription/identity storage engine to use.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process memory; lost on restart.
    Memory,
    /// JSON snapshots in `data_dir`.
    File,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => anyhow::bail!("Unknown storage engine '{other}' (expected memory or file)"),
        }
    }
}

/// Configuration for the campus-push server.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind_address: String,
    /// Port to listen on.
    pub port: u16,
    /// Storage engine.
    pub storage: StorageKind,
    /// Directory for the file storage engine.
    pub data_dir: PathBuf,
    /// Contact URI announced in VAPID claims.
    pub vapid_subject: String,
    /// VAPID public key (base64url) - NOT serialized to disk.
    #[serde(skip_serializing)]
    pub vapid_public_key: Option<String>,
    /// VAPID private key (base64url) - NOT serialized to disk.
    #[serde(skip_serializing)]
    pub vapid_private_key: Option<String>,
    /// Secret for signing login tokens - NOT serialized to disk.
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = Self::config_dir_path()
            .map(|dir| dir.join("data"))
            .unwrap_or_else(|_| PathBuf::from("campus-push-data"));

        Self {
            bind_address: constants::DEFAULT_BIND_ADDRESS.to_string(),
            port: constants::DEFAULT_PORT,
            storage: StorageKind::File,
            data_dir,
            vapid_subject: constants::DEFAULT_VAPID_SUBJECT.to_string(),
            vapid_public_key: None,
            vapid_private_key: None,
            jwt_secret: None,
        }
    }
}

impl Config {
    /// Configuration directory path (not created).
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/campus-push-test`
    /// 2. `CAMPUS_PUSH_CONFIG_DIR` env var: explicit override
    /// 3. `CAMPUS_PUSH_ENV=test`: `tmp/campus-push-test` (integration tests)
    /// 4. Default: platform config dir (Linux: ~/.config/campus-push)
    fn config_dir_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            Ok(crate::env::test_state_dir())
        }

        #[cfg(not(test))]
        {
            if let Ok(dir) = std::env::var("CAMPUS_PUSH_CONFIG_DIR") {
                Ok(PathBuf::from(dir))
            } else if let Some(dir) = crate::env::Environment::current().state_dir() {
                Ok(dir)
            } else {
                Ok(dirs::config_dir()
                    .context("Could not determine config directory")?
                    .join("campus-push"))
            }
        }
    }

    /// Returns the configuration directory path, creating it if necessary.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = Self::config_dir_path()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Path of `config.json` in the config directory.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::config_path()?)?.unwrap_or_default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn load_from_path(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(Some(config))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key → value source (environment in production).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = var("CAMPUS_PUSH_BIND") {
            self.bind_address = bind;
        }

        if let Some(port) = var("CAMPUS_PUSH_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid CAMPUS_PUSH_PORT '{port}'"))?;
        }

        if let Some(storage) = var("CAMPUS_PUSH_STORAGE") {
            self.storage = storage.parse()?;
        }

        if let Some(data_dir) = var("CAMPUS_PUSH_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Some(subject) = var("VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }

        if let Some(public_key) = var("VAPID_PUBLIC_KEY") {
            self.vapid_public_key = Some(public_key);
        }

        if let Some(private_key) = var("VAPID_PRIVATE_KEY") {
            self.vapid_private_key = Some(private_key);
        }

        if let Some(secret) = var("JWT_SECRET") {
            self.jwt_secret = Some(secret);
        }

        Ok(())
    }

    /// Build the VAPID key pair, failing if either half is absent or invalid.
    ///
    /// The server refuses to start without it.
    pub fn vapid_keys(&self) -> Result<VapidKeyPair> {
        let public_key = self
            .vapid_public_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("VAPID_PUBLIC_KEY is not set (run `campus-push generate-vapid-keys`)")?;
        let private_key = self
            .vapid_private_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("VAPID_PRIVATE_KEY is not set (run `campus-push generate-vapid-keys`)")?;
        VapidKeyPair::from_base64url(public_key, private_key).context("Invalid VAPID key pair")
    }

    /// Secret for login tokens; a random per-process secret if none is configured.
    pub fn token_secret(&self) -> Vec<u8> {
        match self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                log::warn!("[Config] JWT_SECRET not set; login tokens will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::RngCore::fill_bytes(&mut rand::rng(), &mut secret);
                secret
            }
        }
    }

    /// Writes the configuration to `config_path` (secrets excluded, mode 0600).
    ///
    /// Used by `campus-push config --write` to pin the effective settings.
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, json)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(config_path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict {}", config_path.display()))?;

        Ok(())
    }
}
