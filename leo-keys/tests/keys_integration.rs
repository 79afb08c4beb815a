//! Contract tests for the key vault service against the in-memory backends.

use anyhow::Result;
use leo_common::logging::{Component, Logger};
use leo_keys::keystore::KeystoreCaps;
use leo_keys::{
    KeyPairHandle, KeyVault, MemoryKeystore, MemoryPreferences, MessageKeyVault, PlatformKeystore,
    PreferenceStore, PublicKeyRecord, VaultConfig, VaultError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn create_test_logger(name: &str) -> Arc<Logger> {
    Arc::new(Logger::new_root(Component::Custom("Keys"), name))
}

fn memory_vault(bits: usize) -> KeyVault {
    let logger = create_test_logger("vault-test");
    KeyVault::new(
        Arc::new(MemoryKeystore::new(logger.clone())),
        Arc::new(MemoryPreferences::new()),
        VaultConfig::in_memory().with_key_bits(bits),
        logger,
    )
    .expect("vault")
}

#[test]
fn roundtrip_under_fresh_rsa_2048_pair() -> Result<()> {
    let vault = memory_vault(2048);
    let pem = vault.generate_key_pair()?;

    for message in ["", "Hello Leo club!", "héllo wörld ✓", &"x".repeat(245)] {
        let payload = vault.encrypt(message, &pem)?;
        assert_eq!(vault.decrypt(payload.as_str())?, message);
    }
    Ok(())
}

#[test]
fn rsa_2048_ceiling_is_245_bytes() -> Result<()> {
    let vault = memory_vault(2048);
    let pem = vault.generate_key_pair()?;
    assert_eq!(vault.max_plaintext_len(&pem)?, 245);

    let err = vault.encrypt(&"y".repeat(246), &pem).unwrap_err();
    assert!(matches!(err, VaultError::Encryption(_)), "got {err:?}");

    // the ceiling counts UTF-8 bytes, not characters
    let multibyte = "é".repeat(123);
    assert_eq!(multibyte.len(), 246);
    assert!(matches!(
        vault.encrypt(&multibyte, &pem),
        Err(VaultError::Encryption(_))
    ));
    Ok(())
}

#[test]
fn has_key_pair_tracks_generation_and_clearing() -> Result<()> {
    let vault = memory_vault(1024);
    assert!(!vault.has_key_pair());
    assert!(vault.get_public_key().is_none());

    let pem = vault.generate_key_pair()?;
    assert!(vault.has_key_pair());
    assert_eq!(vault.get_public_key().as_deref(), Some(pem.as_str()));

    vault.clear_keys();
    assert!(!vault.has_key_pair());
    assert!(vault.get_public_key().is_none());

    // clearing twice is harmless
    vault.clear_keys();
    assert!(!vault.has_key_pair());
    Ok(())
}

#[test]
fn generated_pem_is_well_formed() -> Result<()> {
    let vault = memory_vault(1024);
    let pem = vault.generate_key_pair()?;
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
    assert!(pem.ends_with("\n-----END PUBLIC KEY-----"));
    PublicKeyRecord::parse(&pem)?;
    Ok(())
}

#[test]
fn private_key_is_never_exposed() -> Result<()> {
    let vault = memory_vault(1024);
    assert!(vault.get_private_key().is_none());
    vault.generate_key_pair()?;
    assert!(vault.get_private_key().is_none());
    Ok(())
}

#[test]
fn decrypt_without_key_pair_is_key_not_found() {
    let vault = memory_vault(1024);
    let err = vault.decrypt("AAAA").unwrap_err();
    match err {
        VaultError::KeyNotFound(msg) => assert!(msg.contains("generate a key pair first")),
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[test]
fn encrypt_rejects_pem_without_markers() -> Result<()> {
    let vault = memory_vault(1024);
    let pem = vault.generate_key_pair()?;
    let body: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect();

    for bad in [body.as_str(), "", "-----BEGIN PUBLIC KEY-----\nAAAA"] {
        let err = vault.encrypt("hi", bad).unwrap_err();
        assert!(matches!(err, VaultError::Encryption(_)), "got {err:?}");
    }
    Ok(())
}

#[test]
fn decrypt_rejects_malformed_ciphertext() -> Result<()> {
    let vault = memory_vault(1024);
    vault.generate_key_pair()?;
    for bad in ["not base64 at all!", "AAAA"] {
        assert!(matches!(
            vault.decrypt(bad),
            Err(VaultError::Decryption(_))
        ));
    }
    Ok(())
}

#[test]
fn regeneration_makes_old_ciphertexts_unrecoverable() -> Result<()> {
    let vault = memory_vault(1024);
    let first_pem = vault.generate_key_pair()?;
    let payload = vault.encrypt("before the reset", &first_pem)?;

    let second_pem = vault.generate_key_pair()?;
    assert_ne!(first_pem, second_pem);
    assert_eq!(vault.get_public_key().as_deref(), Some(second_pem.as_str()));

    match vault.decrypt(payload.as_str()) {
        Err(VaultError::Decryption(_)) => {}
        Ok(text) => assert_ne!(text, "before the reset"),
        Err(other) => panic!("unexpected error variant: {other:?}"),
    }
    Ok(())
}

#[test]
fn keystore_and_record_are_independent_state() -> Result<()> {
    let logger = create_test_logger("vault-test");
    let keystore = Arc::new(MemoryKeystore::new(logger.clone()));
    let prefs = Arc::new(MemoryPreferences::new());
    let config = VaultConfig::in_memory().with_key_bits(1024);
    let vault = KeyVault::new(keystore.clone(), prefs.clone(), config.clone(), logger)?;

    vault.generate_key_pair()?;

    // record lost (e.g. preferences wiped) while the keystore entry survives
    prefs.remove(&config.public_key_pref)?;
    assert!(!vault.has_key_pair());
    assert!(vault.get_public_key().is_none());

    // keystore entry lost (e.g. restore onto a new device) while the record survives
    vault.generate_key_pair()?;
    keystore.delete(&config.key_alias)?;
    assert!(!vault.has_key_pair());
    assert!(vault.get_public_key().is_some());
    assert!(matches!(
        vault.decrypt("AAAA"),
        Err(VaultError::KeyNotFound(_))
    ));
    Ok(())
}

#[test]
fn two_devices_exchange_messages() -> Result<()> {
    let alice = memory_vault(1024);
    let bob = memory_vault(1024);
    let alice_pem = alice.generate_key_pair()?;
    let bob_pem = bob.generate_key_pair()?;

    let to_bob = alice.encrypt("See you at the district meeting", &bob_pem)?;
    assert_eq!(bob.decrypt(to_bob.as_str())?, "See you at the district meeting");

    let to_alice = bob.encrypt("RSVP confirmed", &alice_pem)?;
    assert_eq!(alice.decrypt(to_alice.as_str())?, "RSVP confirmed");

    // a device cannot read what was addressed to the other
    match alice.decrypt(to_bob.as_str()) {
        Err(VaultError::Decryption(_)) => {}
        Ok(text) => assert_ne!(text, "See you at the district meeting"),
        Err(other) => panic!("unexpected error variant: {other:?}"),
    }
    Ok(())
}

/* ---------------------- best-effort clear_keys ------------------------- */

struct BrokenKeystore;

impl PlatformKeystore for BrokenKeystore {
    fn generate(&self, _alias: &str, _bits: usize) -> leo_keys::Result<KeyPairHandle> {
        Err(VaultError::Keystore("keystore offline".into()))
    }
    fn load(&self, _alias: &str) -> leo_keys::Result<Option<KeyPairHandle>> {
        Err(VaultError::Keystore("keystore offline".into()))
    }
    fn decrypt(&self, _alias: &str, _ciphertext: &[u8]) -> leo_keys::Result<Vec<u8>> {
        Err(VaultError::Keystore("keystore offline".into()))
    }
    fn delete(&self, _alias: &str) -> leo_keys::Result<bool> {
        Err(VaultError::Keystore("keystore offline".into()))
    }
    fn capabilities(&self) -> KeystoreCaps {
        KeystoreCaps {
            version: 1,
            backend: "broken",
            ..Default::default()
        }
    }
}

struct BrokenPreferences;

impl PreferenceStore for BrokenPreferences {
    fn get(&self, _key: &str) -> leo_keys::Result<Option<String>> {
        Err(VaultError::Preferences("disk full".into()))
    }
    fn put(&self, _key: &str, _value: &str) -> leo_keys::Result<()> {
        Err(VaultError::Preferences("disk full".into()))
    }
    fn remove(&self, _key: &str) -> leo_keys::Result<()> {
        Err(VaultError::Preferences("disk full".into()))
    }
}

fn broken_vault() -> KeyVault {
    let logger = create_test_logger("broken");
    KeyVault::new(
        Arc::new(BrokenKeystore),
        Arc::new(BrokenPreferences),
        VaultConfig::in_memory().with_key_bits(1024),
        logger,
    )
    .expect("vault")
}

#[test]
fn clear_keys_swallows_backend_failures() {
    let vault = broken_vault();
    vault.clear_keys();
    assert!(!vault.has_key_pair());
    assert!(vault.get_public_key().is_none());
}

#[test]
fn backend_failures_map_to_operation_errors() {
    let vault = broken_vault();
    assert!(matches!(
        vault.generate_key_pair(),
        Err(VaultError::KeyGeneration(_))
    ));
    assert!(matches!(vault.decrypt("AAAA"), Err(VaultError::Decryption(_))));
}

#[test]
fn failed_record_write_is_a_generation_error() {
    let logger = create_test_logger("half-broken");
    let vault = KeyVault::new(
        Arc::new(MemoryKeystore::new(logger.clone())),
        Arc::new(BrokenPreferences),
        VaultConfig::in_memory().with_key_bits(1024),
        logger,
    )
    .expect("vault");
    let err = vault.generate_key_pair().unwrap_err();
    match err {
        VaultError::KeyGeneration(msg) => assert!(msg.contains("disk full")),
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert!(!vault.has_key_pair());
}

/// Accepts the first `healthy_puts` writes, then fails like a full disk.
struct FailingAfterPreferences {
    inner: MemoryPreferences,
    healthy_puts: AtomicUsize,
    removes_fail: bool,
}

impl FailingAfterPreferences {
    fn new(healthy_puts: usize, removes_fail: bool) -> Self {
        Self {
            inner: MemoryPreferences::new(),
            healthy_puts: AtomicUsize::new(healthy_puts),
            removes_fail,
        }
    }
}

impl PreferenceStore for FailingAfterPreferences {
    fn get(&self, key: &str) -> leo_keys::Result<Option<String>> {
        self.inner.get(key)
    }
    fn put(&self, key: &str, value: &str) -> leo_keys::Result<()> {
        let remaining = self.healthy_puts.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(VaultError::Preferences("disk full".into()));
        }
        self.healthy_puts.store(remaining - 1, Ordering::SeqCst);
        self.inner.put(key, value)
    }
    fn remove(&self, key: &str) -> leo_keys::Result<()> {
        if self.removes_fail {
            return Err(VaultError::Preferences("disk full".into()));
        }
        self.inner.remove(key)
    }
}

fn vault_over(prefs: FailingAfterPreferences) -> KeyVault {
    let logger = create_test_logger("failing-after");
    KeyVault::new(
        Arc::new(MemoryKeystore::new(logger.clone())),
        Arc::new(prefs),
        VaultConfig::in_memory().with_key_bits(1024),
        logger,
    )
    .expect("vault")
}

#[test]
fn failed_regeneration_leaves_no_orphaned_public_key() -> Result<()> {
    let vault = vault_over(FailingAfterPreferences::new(1, false));
    let old_pem = vault.generate_key_pair()?;
    assert!(vault.has_key_pair());

    assert!(matches!(
        vault.generate_key_pair(),
        Err(VaultError::KeyGeneration(_))
    ));

    // the old key pair is gone, so its record must not be advertised
    assert!(!vault.has_key_pair());
    assert!(vault.get_public_key().is_none());
    let payload = vault.encrypt("sent to the old key", &old_pem)?;
    assert!(matches!(
        vault.decrypt(payload.as_str()),
        Err(VaultError::KeyNotFound(_))
    ));
    Ok(())
}

#[test]
fn failed_regeneration_reports_absent_even_if_record_removal_fails() -> Result<()> {
    let vault = vault_over(FailingAfterPreferences::new(1, true));
    vault.generate_key_pair()?;

    assert!(vault.generate_key_pair().is_err());
    assert!(!vault.has_key_pair());
    assert!(matches!(
        vault.decrypt("AAAA"),
        Err(VaultError::KeyNotFound(_))
    ));
    Ok(())
}
