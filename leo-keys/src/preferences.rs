//! Small encrypted key/value store for the PEM public key record.
//!
//! Kept apart from the keystore so the public key can be read without a
//! keystore round-trip.

use crate::config::{BackendKind, VaultConfig};
use crate::error::{Result, VaultError};
use crate::keystore::persistence::{self, DeviceSecret, Scope};
use leo_common::logging::{Component, Logger};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

pub const PREFERENCES_NAME: &str = "secure_prefs";
pub const PREFERENCES_FILE: &str = "secure_prefs.bin";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Open the preference store matching `config.backend`.
pub fn open_preferences(
    config: &VaultConfig,
    logger: Arc<Logger>,
) -> Result<Arc<dyn PreferenceStore>> {
    let logger = Arc::new(logger.with_component(Component::Preferences));
    let store: Arc<dyn PreferenceStore> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryPreferences::new()),
        _ => Arc::new(EncryptedFilePreferences::open(&config.data_dir, logger)?),
    };
    Ok(store)
}

/* ------------------------------- Memory --------------------------------- */

#[derive(Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> VaultError {
        VaultError::Preferences("memory preferences lock poisoned".into())
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().map_err(|_| Self::poisoned())?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(key);
        Ok(())
    }
}

/* --------------------------- Encrypted file ----------------------------- */

// One lock per preferences file, shared by every instance in the process.
static FILE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(path: &Path) -> Result<Arc<Mutex<()>>> {
    let key = match path.parent().map(std::fs::canonicalize) {
        Some(Ok(dir)) => dir.join(PREFERENCES_FILE),
        _ => path.to_path_buf(),
    };
    let mut locks = FILE_LOCKS
        .lock()
        .map_err(|_| VaultError::Preferences("preferences lock registry poisoned".into()))?;
    Ok(locks.entry(key).or_default().clone())
}

/// JSON map sealed with AES-256-GCM under the device secret, replaced
/// atomically on every write.
pub struct EncryptedFilePreferences {
    path: PathBuf,
    secret: DeviceSecret,
    // serialises read-modify-write cycles on this file within the process
    write_lock: Arc<Mutex<()>>,
    logger: Arc<Logger>,
}

impl EncryptedFilePreferences {
    pub fn open(data_dir: &Path, logger: Arc<Logger>) -> Result<Self> {
        let secret = DeviceSecret::load_or_create(data_dir)?;
        let path = data_dir.join(PREFERENCES_FILE);
        let write_lock = lock_for(&path)?;
        Ok(Self {
            path,
            secret,
            write_lock,
            logger,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scope() -> Scope<'static> {
        Scope::Preferences {
            name: PREFERENCES_NAME,
        }
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>> {
        let Some(sealed) = persistence::read_optional(&self.path)? else {
            return Ok(BTreeMap::new());
        };
        let plain = self
            .secret
            .open(&sealed, &Self::scope())
            .map_err(|e| VaultError::Preferences(format!("cannot unseal preferences: {e}")))?;
        Ok(serde_json::from_slice(&plain)?)
    }

    fn save_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let plain = zeroize::Zeroizing::new(serde_json::to_vec(map)?);
        let sealed = self.secret.seal(&plain, &Self::scope())?;
        persistence::write_atomic(&self.path, &sealed)
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| VaultError::Preferences("preferences lock poisoned".into()))?;
        let mut map = self.load_map()?;
        if f(&mut map) {
            self.save_map(&map)?;
        }
        Ok(())
    }
}

impl PreferenceStore for EncryptedFilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_map()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })?;
        self.logger.debug(format!("Stored preference '{key}'"));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| map.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> Arc<Logger> {
        Arc::new(Logger::new_root(Component::System, "prefs-test"))
    }

    fn exercise(store: &dyn PreferenceStore) {
        assert_eq!(store.get("k").unwrap(), None);
        store.put("k", "v1").unwrap();
        store.put("k", "v2").unwrap();
        store.put("other", "x").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn memory_preferences_contract() {
        exercise(&MemoryPreferences::new());
    }

    #[test]
    fn file_preferences_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&EncryptedFilePreferences::open(dir.path(), logger()).unwrap());
    }

    #[test]
    fn file_preferences_persist_and_are_sealed() {
        let dir = tempfile::tempdir().unwrap();
        let pem = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----";
        {
            let store = EncryptedFilePreferences::open(dir.path(), logger()).unwrap();
            store.put("pem", pem).unwrap();
        }
        let raw = std::fs::read(dir.path().join(PREFERENCES_FILE)).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("BEGIN PUBLIC KEY"));

        let reopened = EncryptedFilePreferences::open(dir.path(), logger()).unwrap();
        assert_eq!(reopened.get("pem").unwrap().as_deref(), Some(pem));
    }

    #[test]
    fn tampered_file_is_a_preferences_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFilePreferences::open(dir.path(), logger()).unwrap();
        store.put("k", "v").unwrap();
        let mut raw = std::fs::read(store.path()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(store.path(), raw).unwrap();
        assert!(matches!(store.get("k"), Err(VaultError::Preferences(_))));
    }

    #[test]
    fn instances_on_one_dir_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let a = Arc::new(EncryptedFilePreferences::open(dir.path(), logger()).unwrap());
        let b = Arc::new(EncryptedFilePreferences::open(dir.path(), logger()).unwrap());
        assert!(Arc::ptr_eq(&a.write_lock, &b.write_lock));

        let writers: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .enumerate()
            .map(|(n, store)| {
                std::thread::spawn(move || {
                    for i in 0..20 {
                        store.put(&format!("w{n}-{i}"), "v").unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        for n in 0..2 {
            for i in 0..20 {
                assert_eq!(a.get(&format!("w{n}-{i}")).unwrap().as_deref(), Some("v"));
            }
        }
    }

    #[test]
    fn open_preferences_follows_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::new(dir.path()).with_backend(BackendKind::File);
        let store = open_preferences(&config, logger()).unwrap();
        store.put("a", "b").unwrap();
        assert!(dir.path().join(PREFERENCES_FILE).exists());

        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::new(dir.path()).with_backend(BackendKind::Memory);
        let store = open_preferences(&config, logger()).unwrap();
        store.put("a", "b").unwrap();
        assert!(!dir.path().join(PREFERENCES_FILE).exists());
    }
}
