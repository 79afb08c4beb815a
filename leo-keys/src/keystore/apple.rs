//! Apple Keychain backend (macOS/iOS).
//!
//! Stores the PKCS#8 private key as a generic-password item (service
//! `leoconnect-vault`, account = alias) through `security-framework`. The item
//! never leaves the Keychain except into this process for a decrypt call.

use super::{
    generate_private_key, not_found, private_key_from_der, private_key_to_der, KeystoreCaps,
    PlatformKeystore,
};
use crate::cipher;
use crate::error::{Result, VaultError};
use crate::types::KeyPairHandle;
use leo_common::logging::Logger;
use rsa::{RsaPrivateKey, RsaPublicKey};
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use std::sync::Arc;
use zeroize::Zeroizing;

/// errSecItemNotFound
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

pub struct KeychainKeystore {
    service: String,
    logger: Arc<Logger>,
}

impl KeychainKeystore {
    pub fn new(service: &str, logger: Arc<Logger>) -> Self {
        Self {
            service: service.to_string(),
            logger,
        }
    }

    fn read_private(&self, alias: &str) -> Result<Option<RsaPrivateKey>> {
        match get_generic_password(&self.service, alias) {
            Ok(der) => {
                let der = Zeroizing::new(der);
                Ok(Some(private_key_from_der(&der)?))
            }
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(VaultError::Keystore(format!("Keychain read failed: {e}"))),
        }
    }
}

impl PlatformKeystore for KeychainKeystore {
    fn generate(&self, alias: &str, bits: usize) -> Result<KeyPairHandle> {
        let private = generate_private_key(bits)?;
        let der = private_key_to_der(&private)?;
        set_generic_password(&self.service, alias, &der)
            .map_err(|e| VaultError::Keystore(format!("Keychain write failed: {e}")))?;
        self.logger
            .debug(format!("Generated RSA-{bits} key pair under '{alias}' in Keychain"));
        Ok(KeyPairHandle::new(alias, RsaPublicKey::from(&private)))
    }

    fn load(&self, alias: &str) -> Result<Option<KeyPairHandle>> {
        Ok(self
            .read_private(alias)?
            .map(|private| KeyPairHandle::new(alias, RsaPublicKey::from(&private))))
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let private = self.read_private(alias)?.ok_or_else(|| not_found(alias))?;
        cipher::decrypt_pkcs1v15(&private, ciphertext)
    }

    fn delete(&self, alias: &str) -> Result<bool> {
        match delete_generic_password(&self.service, alias) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(false),
            Err(e) => Err(VaultError::Keystore(format!("Keychain delete failed: {e}"))),
        }
    }

    fn capabilities(&self) -> KeystoreCaps {
        KeystoreCaps {
            version: 1,
            backend: "keychain",
            hardware_backed: false,
            persistent: true,
            screenlock_required: false,
            strongbox: false,
        }
    }
}
