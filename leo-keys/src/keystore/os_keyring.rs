//! OS credential store backend using the `keyring` crate (Secret Service on
//! Linux, Credential Manager on Windows, Keychain on macOS).
//!
//! The PKCS#8 private key is stored base64-encoded as the entry's secret,
//! under service `leoconnect-vault` and the alias as account.

use super::{
    generate_private_key, not_found, private_key_from_der, private_key_to_der, KeystoreCaps,
    PlatformKeystore,
};
use crate::cipher;
use crate::error::{Result, VaultError};
use crate::types::KeyPairHandle;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keyring::Entry;
use leo_common::logging::Logger;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::Arc;
use zeroize::Zeroizing;

pub struct OsKeyringKeystore {
    service: String,
    logger: Arc<Logger>,
}

impl OsKeyringKeystore {
    pub fn new(service: &str, logger: Arc<Logger>) -> Self {
        Self {
            service: service.to_string(),
            logger,
        }
    }

    fn entry(&self, alias: &str) -> Result<Entry> {
        Entry::new(&self.service, alias)
            .map_err(|e| VaultError::Keystore(format!("keyring entry for '{alias}': {e}")))
    }

    fn read_private(&self, alias: &str) -> Result<Option<RsaPrivateKey>> {
        let encoded = match self.entry(alias)?.get_password() {
            Ok(secret) => Zeroizing::new(secret),
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => {
                return Err(VaultError::Keystore(format!(
                    "Platform secure storage failure: {e}"
                )))
            }
        };
        let der = Zeroizing::new(
            STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| VaultError::Keystore(format!("decode stored key: {e}")))?,
        );
        Ok(Some(private_key_from_der(&der)?))
    }
}

impl PlatformKeystore for OsKeyringKeystore {
    fn generate(&self, alias: &str, bits: usize) -> Result<KeyPairHandle> {
        let private = generate_private_key(bits)?;
        let der = private_key_to_der(&private)?;
        let encoded = Zeroizing::new(STANDARD.encode(der.as_slice()));
        self.entry(alias)?
            .set_password(&encoded)
            .map_err(|e| VaultError::Keystore(format!("Platform secure storage failure: {e}")))?;
        self.logger.debug(format!(
            "Generated RSA-{bits} key pair under '{alias}' in service '{}'",
            self.service
        ));
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
        match self.entry(alias)?.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(VaultError::Keystore(format!(
                "Platform secure storage failure: {e}"
            ))),
        }
    }

    fn capabilities(&self) -> KeystoreCaps {
        KeystoreCaps {
            version: 1,
            backend: "keyring",
            hardware_backed: false,
            persistent: true,
            screenlock_required: false,
            strongbox: false,
        }
    }
}
