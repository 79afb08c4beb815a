//! Async facade over [`MessageKeyVault`].
//!
//! RSA key generation and private-key operations are CPU-bound and the OS
//! backends block on IPC, so every call runs on tokio's blocking pool.

use crate::error::{Result, VaultError};
use crate::types::EncryptedPayload;
use crate::vault::MessageKeyVault;
use std::sync::Arc;
use tokio::task::JoinError;

#[derive(Clone)]
pub struct AsyncKeyVault {
    inner: Arc<dyn MessageKeyVault>,
}

impl AsyncKeyVault {
    pub fn new(inner: Arc<dyn MessageKeyVault>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<dyn MessageKeyVault> {
        &self.inner
    }

    async fn run<T, F>(&self, f: F, on_join_error: fn(String) -> VaultError) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MessageKeyVault) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(inner.as_ref()))
            .await
            .map_err(|e: JoinError| on_join_error(format!("vault task failed: {e}")))?
    }

    pub async fn generate_key_pair(&self) -> Result<String> {
        self.run(|v| v.generate_key_pair(), VaultError::KeyGeneration)
            .await
    }

    pub async fn get_public_key(&self) -> Option<String> {
        self.run(|v| Ok(v.get_public_key()), VaultError::Preferences)
            .await
            .ok()
            .flatten()
    }

    pub async fn get_private_key(&self) -> Option<String> {
        self.inner.get_private_key()
    }

    pub async fn encrypt(&self, plaintext: &str, recipient_pem: &str) -> Result<EncryptedPayload> {
        let plaintext = plaintext.to_string();
        let recipient_pem = recipient_pem.to_string();
        self.run(
            move |v| v.encrypt(&plaintext, &recipient_pem),
            VaultError::Encryption,
        )
        .await
    }

    pub async fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let ciphertext = ciphertext.to_string();
        self.run(move |v| v.decrypt(&ciphertext), VaultError::Decryption)
            .await
    }

    pub async fn has_key_pair(&self) -> bool {
        self.run(|v| Ok(v.has_key_pair()), VaultError::Keystore)
            .await
            .unwrap_or(false)
    }

    pub async fn clear_keys(&self) {
        // clear_keys never fails; a panicked worker is treated as done.
        let _ = self
            .run(
                |v| {
                    v.clear_keys();
                    Ok(())
                },
                VaultError::Keystore,
            )
            .await;
    }
}
