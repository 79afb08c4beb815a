//! Key Vault service.
//!
//! Owns nothing but handles: the device key pair lives in a [`PlatformKeystore`]
//! under a fixed alias, and its PEM public key is mirrored in a
//! [`PreferenceStore`]. The two are checked independently.
//!
//! Lifecycle: `Absent -> Present` via [`MessageKeyVault::generate_key_pair`]
//! (which also replaces an existing pair, making old ciphertexts
//! undecryptable) and `Present -> Absent` via [`MessageKeyVault::clear_keys`].

use crate::cipher;
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::keystore::{self, KeystoreCaps, PlatformKeystore};
use crate::preferences::{self, PreferenceStore};
use crate::types::{EncryptedPayload, PublicKeyRecord};
use leo_common::logging::{Component, Logger};
use std::sync::Arc;

/// The message-encryption capability handed to message composition and display.
pub trait MessageKeyVault: Send + Sync {
    /// Generate (or replace) the device key pair and return its PEM public key.
    fn generate_key_pair(&self) -> Result<String>;

    /// The stored PEM public key, or `None` if no key pair was generated.
    fn get_public_key(&self) -> Option<String>;

    /// Always `None`: the private key cannot be exported from the keystore.
    fn get_private_key(&self) -> Option<String> {
        None
    }

    /// Encrypt `plaintext` for the holder of `recipient_pem`.
    fn encrypt(&self, plaintext: &str, recipient_pem: &str) -> Result<EncryptedPayload>;

    /// Decrypt a base64 payload addressed to this device.
    fn decrypt(&self, ciphertext: &str) -> Result<String>;

    /// True only when both the keystore entry and the PEM record exist.
    fn has_key_pair(&self) -> bool;

    /// Best-effort removal of both halves of the state. Never fails.
    fn clear_keys(&self);
}

pub struct KeyVault {
    keystore: Arc<dyn PlatformKeystore>,
    preferences: Arc<dyn PreferenceStore>,
    config: VaultConfig,
    logger: Arc<Logger>,
}

impl KeyVault {
    pub fn new(
        keystore: Arc<dyn PlatformKeystore>,
        preferences: Arc<dyn PreferenceStore>,
        config: VaultConfig,
        logger: Arc<Logger>,
    ) -> Result<Self> {
        config.validate()?;
        let logger = Arc::new(logger.with_component(Component::Vault));
        let caps = keystore.capabilities();
        logger.info(format!(
            "Key vault ready (backend={}, hardware_backed={}, alias='{}')",
            caps.backend, caps.hardware_backed, config.key_alias
        ));
        Ok(Self {
            keystore,
            preferences,
            config,
            logger,
        })
    }

    /// Open the backends `config` selects for this platform.
    pub fn open(config: VaultConfig, logger: Arc<Logger>) -> Result<Self> {
        config.validate()?;
        let keystore = keystore::open_keystore(&config, logger.clone())?;
        let preferences = preferences::open_preferences(&config, logger.clone())?;
        Self::new(keystore, preferences, config, logger)
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn capabilities(&self) -> KeystoreCaps {
        self.keystore.capabilities()
    }

    /// SHA-256 fingerprint of the stored public key.
    pub fn public_key_fingerprint(&self) -> Option<String> {
        let pem = self.get_public_key()?;
        match PublicKeyRecord::parse(&pem) {
            Ok(record) => Some(record.fingerprint()),
            Err(e) => {
                self.logger
                    .warn(format!("Stored public key record is unreadable: {e}"));
                None
            }
        }
    }

    /// Largest message, in UTF-8 bytes, that can be encrypted for `recipient_pem`.
    pub fn max_plaintext_len(&self, recipient_pem: &str) -> Result<usize> {
        let record = parse_recipient(recipient_pem)?;
        let key = record
            .public_key()
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        Ok(cipher::max_plaintext_len(&key))
    }

    fn try_generate(&self) -> Result<PublicKeyRecord> {
        let alias = &self.config.key_alias;
        let handle = self.keystore.generate(alias, self.config.key_bits)?;
        let record = handle.public_key_record()?;
        if let Err(e) = self
            .preferences
            .put(&self.config.public_key_pref, record.as_pem())
        {
            self.discard_partial_generation();
            return Err(e);
        }
        Ok(record)
    }

    /// Drop both halves after a failed record write; the previous private key
    /// is already overwritten.
    fn discard_partial_generation(&self) {
        let logger = self.logger.with_operation("generate_key_pair");
        let alias = &self.config.key_alias;
        if let Err(e) = self.keystore.delete(alias) {
            logger.warn(format!("Failed to roll back key pair '{alias}': {e}"));
        }
        if let Err(e) = self.preferences.remove(&self.config.public_key_pref) {
            logger.warn(format!("Failed to remove stale public key record: {e}"));
        }
    }
}

fn parse_recipient(recipient_pem: &str) -> Result<PublicKeyRecord> {
    PublicKeyRecord::parse(recipient_pem)
        .map_err(|e| VaultError::Encryption(format!("recipient public key rejected: {e}")))
}

impl MessageKeyVault for KeyVault {
    fn generate_key_pair(&self) -> Result<String> {
        let logger = self.logger.with_operation("generate_key_pair");
        match self.try_generate() {
            Ok(record) => {
                logger.info(format!(
                    "Generated RSA-{} key pair '{}' (fingerprint {})",
                    self.config.key_bits,
                    self.config.key_alias,
                    record.short_fingerprint()
                ));
                Ok(record.into_pem())
            }
            Err(e) => {
                logger.error(format!("Key pair generation failed: {e}"));
                Err(match e {
                    VaultError::KeyGeneration(msg) => VaultError::KeyGeneration(msg),
                    other => VaultError::KeyGeneration(other.to_string()),
                })
            }
        }
    }

    fn get_public_key(&self) -> Option<String> {
        match self.preferences.get(&self.config.public_key_pref) {
            Ok(pem) => pem,
            Err(e) => {
                self.logger
                    .with_operation("get_public_key")
                    .warn(format!("Public key record could not be read: {e}"));
                None
            }
        }
    }

    fn encrypt(&self, plaintext: &str, recipient_pem: &str) -> Result<EncryptedPayload> {
        let record = parse_recipient(recipient_pem)?;
        let key = record
            .public_key()
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        let ciphertext = cipher::encrypt_pkcs1v15(&key, plaintext.as_bytes())?;
        self.logger.with_operation("encrypt").debug(format!(
            "Encrypted {} bytes for recipient {}",
            plaintext.len(),
            record.short_fingerprint()
        ));
        Ok(EncryptedPayload::from_ciphertext(&ciphertext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let logger = self.logger.with_operation("decrypt");
        let alias = &self.config.key_alias;

        let present = self
            .keystore
            .contains(alias)
            .map_err(|e| VaultError::Decryption(format!("keystore unavailable: {e}")))?;
        if !present {
            logger.warn(format!("No key pair under '{alias}'"));
            return Err(VaultError::KeyNotFound(
                "no key pair on this device; generate a key pair first".into(),
            ));
        }

        let bytes = cipher::decode_payload(ciphertext)?;
        let plain = self.keystore.decrypt(alias, &bytes).map_err(|e| match e {
            VaultError::Decryption(msg) => VaultError::Decryption(msg),
            VaultError::KeyNotFound(msg) => VaultError::KeyNotFound(msg),
            other => VaultError::Decryption(other.to_string()),
        })?;
        let text = String::from_utf8(plain)
            .map_err(|e| VaultError::Decryption(format!("plaintext is not UTF-8: {e}")))?;
        logger.debug(format!("Decrypted {} bytes", text.len()));
        Ok(text)
    }

    fn has_key_pair(&self) -> bool {
        let alias = &self.config.key_alias;
        let in_keystore = match self.keystore.contains(alias) {
            Ok(present) => present,
            Err(e) => {
                self.logger
                    .warn(format!("Keystore check for '{alias}' failed: {e}"));
                false
            }
        };
        in_keystore && self.get_public_key().is_some()
    }

    fn clear_keys(&self) {
        let logger = self.logger.with_operation("clear_keys");
        let alias = &self.config.key_alias;

        match self.keystore.delete(alias) {
            Ok(true) => logger.info(format!("Deleted key pair '{alias}'")),
            Ok(false) => logger.debug(format!("No key pair under '{alias}' to delete")),
            Err(e) => logger.warn(format!("Failed to delete key pair '{alias}': {e}")),
        }

        if let Err(e) = self.preferences.remove(&self.config.public_key_pref) {
            logger.warn(format!("Failed to remove public key record: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeystore;
    use crate::preferences::MemoryPreferences;

    fn vault() -> KeyVault {
        let logger = Arc::new(Logger::new_root(Component::System, "vault-unit"));
        KeyVault::new(
            Arc::new(MemoryKeystore::new(logger.clone())),
            Arc::new(MemoryPreferences::new()),
            VaultConfig::in_memory().with_key_bits(1024),
            logger,
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let logger = Arc::new(Logger::new_root(Component::System, "vault-unit"));
        let result = KeyVault::new(
            Arc::new(MemoryKeystore::new(logger.clone())),
            Arc::new(MemoryPreferences::new()),
            VaultConfig::in_memory().with_key_bits(100),
            logger,
        );
        assert!(matches!(result, Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn fingerprint_follows_generated_key() {
        let vault = vault();
        assert!(vault.public_key_fingerprint().is_none());
        let pem = vault.generate_key_pair().unwrap();
        let expected = PublicKeyRecord::parse(&pem).unwrap().fingerprint();
        assert_eq!(vault.public_key_fingerprint(), Some(expected));
    }

    #[test]
    fn max_plaintext_len_reports_pkcs1_ceiling() {
        let vault = vault();
        let pem = vault.generate_key_pair().unwrap();
        assert_eq!(vault.max_plaintext_len(&pem).unwrap(), 117);
        assert!(matches!(
            vault.max_plaintext_len("garbage"),
            Err(VaultError::Encryption(_))
        ));
    }

    #[test]
    fn capabilities_come_from_keystore() {
        assert_eq!(vault().capabilities().backend, "memory");
    }
}
