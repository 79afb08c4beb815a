//! Process-local keystore.
//!
//! Keys live in memory only and vanish with the process. Used by tests and as
//! the simulator/development backend where no secure storage exists.

use super::{generate_private_key, not_found, KeystoreCaps, PlatformKeystore};
use crate::cipher;
use crate::error::{Result, VaultError};
use crate::types::KeyPairHandle;
use leo_common::logging::Logger;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct MemoryKeystore {
    keys: RwLock<HashMap<String, RsaPrivateKey>>,
    logger: Arc<Logger>,
}

impl MemoryKeystore {
    pub fn new(logger: Arc<Logger>) -> Self {
        logger.warn("Using MemoryKeystore - keys are not hardware-backed and will not persist");
        Self {
            keys: RwLock::new(HashMap::new()),
            logger,
        }
    }

    fn poisoned() -> VaultError {
        VaultError::Keystore("memory keystore lock poisoned".into())
    }
}

impl PlatformKeystore for MemoryKeystore {
    fn generate(&self, alias: &str, bits: usize) -> Result<KeyPairHandle> {
        let private = generate_private_key(bits)?;
        let public = RsaPublicKey::from(&private);
        let replaced = self
            .keys
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(alias.to_string(), private)
            .is_some();
        self.logger.debug(format!(
            "Generated RSA-{bits} key pair under '{alias}' (replaced existing: {replaced})"
        ));
        Ok(KeyPairHandle::new(alias, public))
    }

    fn load(&self, alias: &str) -> Result<Option<KeyPairHandle>> {
        let keys = self.keys.read().map_err(|_| Self::poisoned())?;
        Ok(keys
            .get(alias)
            .map(|private| KeyPairHandle::new(alias, RsaPublicKey::from(private))))
    }

    fn contains(&self, alias: &str) -> Result<bool> {
        Ok(self
            .keys
            .read()
            .map_err(|_| Self::poisoned())?
            .contains_key(alias))
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let keys = self.keys.read().map_err(|_| Self::poisoned())?;
        let private = keys.get(alias).ok_or_else(|| not_found(alias))?;
        cipher::decrypt_pkcs1v15(private, ciphertext)
    }

    fn delete(&self, alias: &str) -> Result<bool> {
        let removed = self
            .keys
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(alias)
            .is_some();
        Ok(removed)
    }

    fn capabilities(&self) -> KeystoreCaps {
        KeystoreCaps {
            version: 1,
            backend: "memory",
            hardware_backed: false,
            persistent: false,
            screenlock_required: false,
            strongbox: false,
        }
    }
}
