//! Platform keystore abstraction for the device RSA key pair.
//!
//! A keystore generates a key pair under an alias, hands back only the public
//! half and performs private-key operations in place. Backends:
//! - `MemoryKeystore`: process-local, for tests and simulators.
//! - `FileKeystore`: PKCS#8 sealed with AES-256-GCM under the device secret.
//! - `OsKeyringKeystore`: OS credential store, feature `os-keyring`.
//! - `KeychainKeystore`: Apple Keychain, feature `apple-keystore`.

use crate::config::{BackendKind, VaultConfig};
use crate::error::{Result, VaultError};
use crate::types::KeyPairHandle;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use leo_common::logging::{Component, Logger};
use pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

pub mod file;
pub mod memory;
pub mod persistence;

#[cfg(feature = "os-keyring")]
pub mod os_keyring;

#[cfg(all(
    feature = "apple-keystore",
    any(target_os = "macos", target_os = "ios")
))]
pub mod apple;

pub use file::FileKeystore;
pub use memory::MemoryKeystore;

/// Service name under which OS-backed keystores file their entries.
pub const KEYSTORE_SERVICE: &str = "leoconnect-vault";

pub(crate) const AES_GCM_NONCE_LEN: usize = 12;
pub(crate) const AES_GCM_TAG_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeystoreCaps {
    pub version: u32,              // struct version; start at 1
    pub backend: &'static str,     // short backend name for logs and status output
    pub hardware_backed: bool,     // true when Secure Enclave/TEE is used
    pub persistent: bool,          // key survives process restart
    pub screenlock_required: bool, // true when device passcode required
    pub strongbox: bool,           // Android strongbox; always false elsewhere
}

pub trait PlatformKeystore: Send + Sync {
    /// Generate a key pair under `alias`, replacing whatever was there.
    fn generate(&self, alias: &str, bits: usize) -> Result<KeyPairHandle>;

    /// Public view of the key pair under `alias`, if any.
    fn load(&self, alias: &str) -> Result<Option<KeyPairHandle>>;

    fn contains(&self, alias: &str) -> Result<bool> {
        Ok(self.load(alias)?.is_some())
    }

    /// Decrypt one PKCS#1 v1.5 block with the private key under `alias`.
    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Remove the key pair. Returns `false` if there was nothing to remove.
    fn delete(&self, alias: &str) -> Result<bool>;

    fn capabilities(&self) -> KeystoreCaps;
}

/* ------------------------------ Platform -------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    MacOs,
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn is_apple(&self) -> bool {
        matches!(self, Platform::Ios | Platform::MacOs)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn `Auto` into a concrete backend for `platform`, given what was compiled in.
pub fn resolve_backend(requested: BackendKind, platform: Platform) -> BackendKind {
    if requested != BackendKind::Auto {
        return requested;
    }
    if platform.is_apple() && cfg!(feature = "apple-keystore") {
        return BackendKind::Keychain;
    }
    if matches!(
        platform,
        Platform::Linux | Platform::Windows | Platform::MacOs
    ) && cfg!(feature = "os-keyring")
    {
        return BackendKind::Keyring;
    }
    // Android hosts point data_dir at the app-private files directory.
    BackendKind::File
}

/// Open the keystore selected by `config` for the current platform.
pub fn open_keystore(config: &VaultConfig, logger: Arc<Logger>) -> Result<Arc<dyn PlatformKeystore>> {
    let platform = Platform::current();
    let backend = resolve_backend(config.backend, platform);
    let logger = Arc::new(logger.with_component(Component::Keystore));
    logger.debug(format!(
        "Opening {backend} keystore on {platform} (requested {})",
        config.backend
    ));

    let keystore: Arc<dyn PlatformKeystore> = match backend {
        BackendKind::Memory => Arc::new(MemoryKeystore::new(logger)),
        BackendKind::File | BackendKind::Auto => {
            Arc::new(FileKeystore::open(&config.data_dir, logger)?)
        }
        BackendKind::Keyring => open_os_keyring(logger)?,
        BackendKind::Keychain => open_keychain(logger)?,
    };
    Ok(keystore)
}

#[cfg(feature = "os-keyring")]
fn open_os_keyring(logger: Arc<Logger>) -> Result<Arc<dyn PlatformKeystore>> {
    Ok(Arc::new(os_keyring::OsKeyringKeystore::new(
        KEYSTORE_SERVICE,
        logger,
    )))
}

#[cfg(not(feature = "os-keyring"))]
fn open_os_keyring(_logger: Arc<Logger>) -> Result<Arc<dyn PlatformKeystore>> {
    Err(VaultError::Unavailable(
        "keyring backend requires feature `os-keyring`".into(),
    ))
}

#[cfg(all(
    feature = "apple-keystore",
    any(target_os = "macos", target_os = "ios")
))]
fn open_keychain(logger: Arc<Logger>) -> Result<Arc<dyn PlatformKeystore>> {
    Ok(Arc::new(apple::KeychainKeystore::new(
        KEYSTORE_SERVICE,
        logger,
    )))
}

#[cfg(not(all(
    feature = "apple-keystore",
    any(target_os = "macos", target_os = "ios")
)))]
fn open_keychain(_logger: Arc<Logger>) -> Result<Arc<dyn PlatformKeystore>> {
    Err(VaultError::Unavailable(
        "keychain backend requires feature `apple-keystore` on macOS or iOS".into(),
    ))
}

/* ------------------------- Shared key helpers --------------------------- */

pub(crate) fn generate_private_key(bits: usize) -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| VaultError::KeyGeneration(format!("RSA-{bits} generation failed: {e}")))
}

pub(crate) fn private_key_to_der(key: &RsaPrivateKey) -> Result<Zeroizing<Vec<u8>>> {
    let doc = key
        .to_pkcs8_der()
        .map_err(|e| VaultError::InvalidKeyFormat(format!("PKCS#8 encoding error: {e}")))?;
    Ok(Zeroizing::new(doc.as_bytes().to_vec()))
}

pub(crate) fn private_key_from_der(der: &[u8]) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| VaultError::Keystore(format!("stored private key is unreadable: {e}")))
}

pub(crate) fn not_found(alias: &str) -> VaultError {
    VaultError::KeyNotFound(format!(
        "no key pair under alias '{alias}'; generate a key pair first"
    ))
}

/// Hex of the alias bytes: a file-name-safe stem that is distinct per alias.
pub(crate) fn alias_file_stem(alias: &str) -> String {
    hex::encode(alias.as_bytes())
}

/* ----------------------------- AEAD sealing ----------------------------- */

/// AES-256-GCM; output is `nonce[12] || ciphertext || tag[16]`.
pub(crate) fn aes_gcm_encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Keystore(format!("AES init failed: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher.encrypt(
        &nonce,
        Payload {
            msg: plaintext,
            aad,
        },
    )?;
    let mut out = Vec::with_capacity(AES_GCM_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn aes_gcm_decrypt(key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < AES_GCM_NONCE_LEN + AES_GCM_TAG_LEN {
        return Err(VaultError::Keystore(
            "sealed blob too short (need nonce[12] + tag[16])".into(),
        ));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Keystore(format!("AES init failed: {e}")))?;
    let (nonce, ciphertext) = sealed.split_at(AES_GCM_NONCE_LEN);
    let plain = cipher.decrypt(
        Nonce::from_slice(nonce),
        Payload {
            msg: ciphertext,
            aad,
        },
    )?;
    Ok(plain)
}
