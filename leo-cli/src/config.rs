//! Configuration management for the LeoConnect vault CLI
//!
//! The CLI keeps one `vault.json` per config directory, holding the device id
//! used as the log prefix and the [`VaultConfig`] the vault is opened with.

use anyhow::{Context, Result};
use leo_keys::VaultConfig;
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const CONFIG_FILE: &str = "vault.json";
pub const DEFAULT_CONFIG_DIR: &str = ".leoconnect";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Random id for this installation (format: leo_{uuid})
    pub device_id: String,

    /// Vault settings; `data_dir` defaults to the config directory
    pub vault: VaultConfig,
}

impl CliConfig {
    pub fn new(vault: VaultConfig) -> Self {
        Self {
            device_id: format!("leo_{}", Uuid::new_v4()),
            vault,
        }
    }

    /// Fresh configuration for `config_dir`, honouring `LEO_VAULT_*` overrides.
    pub fn from_env(config_dir: &Path) -> Result<Self> {
        let vault = VaultConfig::from_env(config_dir.to_path_buf())
            .context("Invalid LEO_VAULT_* environment")?;
        Ok(Self::new(vault))
    }

    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE)
    }

    /// Load configuration from file
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_file = Self::path(config_dir);

        if !config_file.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file not found: {:?} (run `leo-vault init` first)",
                config_file
            ));
        }

        let config_content = std::fs::read_to_string(&config_file)
            .with_context(|| format!("Failed to read config file: {config_file:?}"))?;

        let config: CliConfig = from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {config_file:?}"))?;

        config
            .vault
            .validate()
            .with_context(|| format!("Invalid vault settings in {config_file:?}"))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        let config_file = Self::path(config_dir);

        let config_content = to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_file, config_content)
            .with_context(|| format!("Failed to write config file: {config_file:?}"))?;

        Ok(())
    }

    pub fn exists(config_dir: &Path) -> bool {
        Self::path(config_dir).exists()
    }
}

/// `~/.leoconnect`, or an error when the home directory is unknown.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CONFIG_DIR))
        .context("Could not determine home directory; pass --config-dir")
}
