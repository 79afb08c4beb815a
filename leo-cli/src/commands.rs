//! Vault commands
//!
//! Each command returns the text to print, so `main` stays a thin dispatcher
//! and the flows can be driven from tests.

use anyhow::{Context, Result};
use leo_common::logging::{Component, Logger};
use leo_keys::{AsyncKeyVault, KeyVault};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CliConfig;

pub struct VaultCommand {
    config_dir: PathBuf,
    logger: Arc<Logger>,
}

/// An opened vault plus the configuration it came from.
struct Session {
    config: CliConfig,
    vault: Arc<KeyVault>,
    handle: AsyncKeyVault,
}

impl VaultCommand {
    pub fn new(config_dir: PathBuf, logger: Arc<Logger>) -> Self {
        Self { config_dir, logger }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Write a fresh `vault.json`. Existing configuration is kept unless `force`.
    pub async fn init(&self, force: bool) -> Result<String> {
        if CliConfig::exists(&self.config_dir) && !force {
            return Ok(format!(
                "Configuration already exists in {:?}\nUse --force to re-initialize.",
                self.config_dir
            ));
        }
        if force {
            self.logger
                .info("Force flag specified - re-initializing configuration");
        }

        let config = CliConfig::from_env(&self.config_dir)?;
        config.save(&self.config_dir)?;
        self.logger.info(format!(
            "Initialized device {} (backend={}, key_bits={})",
            config.device_id, config.vault.backend, config.vault.key_bits
        ));
        Ok(format!(
            "Initialized vault configuration in {:?}\nDevice: {}\nNext: run `leo-vault generate` to create the device key pair.",
            self.config_dir, config.device_id
        ))
    }

    fn open(&self) -> Result<Session> {
        let config = CliConfig::load(&self.config_dir)?;
        let logger = Arc::new(Logger::new_root(Component::Cli, &config.device_id));
        let vault = Arc::new(
            KeyVault::open(config.vault.clone(), logger).context("Failed to open key vault")?,
        );
        let handle = AsyncKeyVault::new(vault.clone());
        Ok(Session {
            config,
            vault,
            handle,
        })
    }

    pub async fn generate(&self) -> Result<String> {
        let session = self.open()?;
        let pem = session
            .handle
            .generate_key_pair()
            .await
            .context("Key pair generation failed")?;
        let fingerprint = session.vault.public_key_fingerprint().unwrap_or_default();
        Ok(format!("{pem}\nFingerprint: {fingerprint}"))
    }

    pub async fn public_key(&self) -> Result<String> {
        let session = self.open()?;
        session
            .handle
            .get_public_key()
            .await
            .context("No public key stored; run `leo-vault generate` first")
    }

    pub async fn status(&self) -> Result<String> {
        let session = self.open()?;
        let caps = session.vault.capabilities();
        let has_key_pair = session.handle.has_key_pair().await;

        let mut out = String::new();
        writeln!(out, "Device:          {}", session.config.device_id)?;
        writeln!(out, "Data directory:  {}", session.config.vault.data_dir.display())?;
        writeln!(
            out,
            "Backend:         {} (hardware-backed: {}, persistent: {})",
            caps.backend, caps.hardware_backed, caps.persistent
        )?;
        writeln!(out, "Key alias:       {}", session.config.vault.key_alias)?;
        write!(out, "Key pair:        {}", if has_key_pair { "present" } else { "absent" })?;

        if let Some(pem) = session.handle.get_public_key().await {
            let fingerprint = session.vault.public_key_fingerprint().unwrap_or_default();
            let limit = session.vault.max_plaintext_len(&pem)?;
            write!(out, "\nFingerprint:     {fingerprint}")?;
            write!(out, "\nMax message:     {limit} bytes")?;
        }
        Ok(out)
    }

    /// Encrypt `message` for the PEM in `recipient`, or for this device when `None`.
    pub async fn encrypt(&self, message: &str, recipient: Option<&Path>) -> Result<String> {
        let session = self.open()?;
        let recipient_pem = match recipient {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read recipient key: {path:?}"))?,
            None => session
                .handle
                .get_public_key()
                .await
                .context("No public key stored; run `leo-vault generate` first")?,
        };
        let payload = session
            .handle
            .encrypt(message, &recipient_pem)
            .await
            .context("Encryption failed")?;
        Ok(payload.into_string())
    }

    pub async fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let session = self.open()?;
        let text = session
            .handle
            .decrypt(ciphertext)
            .await
            .context("Decryption failed")?;
        Ok(text)
    }

    pub async fn clear(&self) -> Result<String> {
        let session = self.open()?;
        session.handle.clear_keys().await;
        Ok(format!(
            "Cleared key pair '{}'",
            session.config.vault.key_alias
        ))
    }
}
