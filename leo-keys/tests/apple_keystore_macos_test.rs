#![cfg(all(feature = "apple-keystore", target_os = "macos"))]

use leo_common::logging::{Component, Logger};
use leo_keys::cipher;
use leo_keys::keystore::apple::KeychainKeystore;
use leo_keys::PlatformKeystore;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn with_timeout<F: FnOnce() + Send + 'static>(dur: Duration, f: F) {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        f();
        let _ = tx.send(());
    });
    match rx.recv_timeout(dur) {
        Ok(()) => (),
        Err(_) => panic!("test timed out after {dur:?}"),
    }
}

#[test]
fn test_keychain_roundtrip_macos() {
    with_timeout(Duration::from_secs(30), || {
        let logger = Arc::new(Logger::new_root(Component::System, "keychain-test"));
        let service = "com.leoconnect.vault.test";
        let alias = "roundtrip_key";
        let ks = KeychainKeystore::new(service, logger);
        let caps = ks.capabilities();
        assert_eq!(caps.backend, "keychain");
        // generic-password items carry no access control policy
        assert!(!caps.screenlock_required);

        let handle = ks.generate(alias, 1024).expect("generate");
        assert!(ks.contains(alias).expect("contains"));
        let ct = cipher::encrypt_pkcs1v15(handle.public_key(), b"hello keychain").expect("encrypt");
        let pt = ks.decrypt(alias, &ct).expect("decrypt");
        assert_eq!(pt, b"hello keychain");

        assert!(ks.delete(alias).expect("delete"));
        assert!(!ks.contains(alias).expect("contains after delete"));
        // cleanup
        let _ = security_framework::passwords::delete_generic_password(service, alias);
    });
}
