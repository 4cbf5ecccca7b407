//! Configuration loading and persistence.
//!
//! Handles reading and writing the deputy configuration file. Only feature
//! flags, timeouts and storage locations live here; none of it changes the
//! coordination protocol itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::constants;

/// Module flag that enables the case-page session coordinator.
pub const CCI_MODULE: &str = "cci";

/// Configuration for deputy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// How long `send_and_wait` waits for a reply, in milliseconds.
    pub message_timeout_ms: u64,
    /// Case page cache records older than this many days are pruned.
    pub cache_retention_days: u32,
    /// Directory of the durable key-value store. `None` means
    /// `<config_dir>/storage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    /// Enabled modules (`cci`, `ante`, `ia`).
    pub modules: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            message_timeout_ms: constants::DEFAULT_MESSAGE_TIMEOUT_MS,
            cache_retention_days: constants::DEFAULT_CACHE_RETENTION_DAYS,
            storage_dir: None,
            modules: vec!["cci".to_string(), "ante".to_string(), "ia".to_string()],
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/deputy-test`
    /// 2. `DEPUTY_CONFIG_DIR` env var: explicit override
    /// 3. `DEPUTY_ENV=test`: `tmp/deputy-test` (integration tests)
    /// 4. Default: platform config dir (Linux: ~/.config/deputy)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/deputy-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(custom_dir) = std::env::var("DEPUTY_CONFIG_DIR") {
                    PathBuf::from(custom_dir)
                } else if crate::env::is_any_test() {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/deputy-test")
                } else {
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join("deputy")
                }
            }
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to defaults.
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default config: {e:#}");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(timeout) = std::env::var("DEPUTY_MESSAGE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.message_timeout_ms = ms;
            }
        }

        if let Ok(days) = std::env::var("DEPUTY_CACHE_RETENTION_DAYS") {
            if let Ok(days) = days.parse::<u32>() {
                self.cache_retention_days = days;
            }
        }

        if let Ok(dir) = std::env::var("DEPUTY_STORAGE_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }
    }

    /// Persists the current configuration to disk and returns the file path.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        log::debug!("Saved config to {}", config_path.display());
        Ok(config_path)
    }

    /// Reply timeout for request/response exchanges on the message bus.
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    /// Maximum age of a case page cache record before pruning.
    pub fn cache_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.cache_retention_days))
    }

    /// Resolved storage directory.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("storage")),
        }
    }

    /// Whether a module is enabled.
    pub fn is_module_enabled(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    /// Builder-style helper used by tests and the simulation.
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
