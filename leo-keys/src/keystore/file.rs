//! Software keystore on the filesystem.
//!
//! Each alias maps to `<data_dir>/keystore/<hex(alias)>.key`, holding the PKCS#8
//! private key sealed with AES-256-GCM under the device secret. The alias is
//! bound into the AAD, so renaming a file does not move a key to another alias.

use super::persistence::{self, DeviceSecret, Scope};
use super::{
    alias_file_stem, generate_private_key, not_found, private_key_from_der, private_key_to_der,
    KeystoreCaps, PlatformKeystore,
};
use crate::cipher;
use crate::error::Result;
use crate::types::KeyPairHandle;
use leo_common::logging::Logger;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const KEYSTORE_DIR: &str = "keystore";

pub struct FileKeystore {
    dir: PathBuf,
    secret: DeviceSecret,
    logger: Arc<Logger>,
}

impl FileKeystore {
    pub fn open(data_dir: &Path, logger: Arc<Logger>) -> Result<Self> {
        let secret = DeviceSecret::load_or_create(data_dir)?;
        let dir = data_dir.join(KEYSTORE_DIR);
        std::fs::create_dir_all(&dir)?;
        logger.debug(format!("File keystore opened at {}", dir.display()));
        Ok(Self {
            dir,
            secret,
            logger,
        })
    }

    pub fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{}.key", alias_file_stem(alias)))
    }

    fn read_private(&self, alias: &str) -> Result<Option<RsaPrivateKey>> {
        let Some(sealed) = persistence::read_optional(&self.key_path(alias))? else {
            return Ok(None);
        };
        let der = self.secret.open(&sealed, &Scope::PrivateKey { alias })?;
        Ok(Some(private_key_from_der(&der)?))
    }
}

impl PlatformKeystore for FileKeystore {
    fn generate(&self, alias: &str, bits: usize) -> Result<KeyPairHandle> {
        let private = generate_private_key(bits)?;
        let der = private_key_to_der(&private)?;
        let sealed = self.secret.seal(&der, &Scope::PrivateKey { alias })?;
        persistence::write_atomic(&self.key_path(alias), &sealed)?;
        self.logger
            .debug(format!("Generated RSA-{bits} key pair under '{alias}'"));
        Ok(KeyPairHandle::new(alias, RsaPublicKey::from(&private)))
    }

    fn load(&self, alias: &str) -> Result<Option<KeyPairHandle>> {
        Ok(self
            .read_private(alias)?
            .map(|private| KeyPairHandle::new(alias, RsaPublicKey::from(&private))))
    }

    fn contains(&self, alias: &str) -> Result<bool> {
        Ok(self.key_path(alias).is_file())
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let private = self.read_private(alias)?.ok_or_else(|| not_found(alias))?;
        cipher::decrypt_pkcs1v15(&private, ciphertext)
    }

    fn delete(&self, alias: &str) -> Result<bool> {
        let removed = persistence::remove_if_exists(&self.key_path(alias))?;
        if removed {
            self.logger.debug(format!("Deleted key pair under '{alias}'"));
        }
        Ok(removed)
    }

    fn capabilities(&self) -> KeystoreCaps {
        KeystoreCaps {
            version: 1,
            backend: "file",
            hardware_backed: false,
            persistent: true,
            screenlock_required: false,
            strongbox: false,
        }
    }
}
