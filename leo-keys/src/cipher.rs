//! RSA PKCS#1 v1.5 single-block encryption and the base64 payload codec.
//!
//! One RSA operation per message: no chaining, no hybrid scheme. Plaintext
//! is capped at the modulus size minus the 11 bytes of padding overhead.

use crate::error::{Result, VaultError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

/// Bytes of PKCS#1 v1.5 encryption padding overhead.
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Largest plaintext, in bytes, that fits in one block for `key`.
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(PKCS1_V15_OVERHEAD)
}

pub fn encrypt_pkcs1v15(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let limit = max_plaintext_len(key);
    if plaintext.len() > limit {
        return Err(VaultError::Encryption(format!(
            "plaintext is {} bytes, RSA-{} with PKCS#1 v1.5 allows at most {limit}",
            plaintext.len(),
            key.size() * 8
        )));
    }
    key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(|e| VaultError::Encryption(format!("RSA encryption failed: {e}")))
}

pub fn decrypt_pkcs1v15(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    key.decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|e| VaultError::Decryption(format!("RSA decryption failed: {e}")))
}

pub fn encode_payload(ciphertext: &[u8]) -> String {
    STANDARD.encode(ciphertext)
}

pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload.trim().as_bytes())
        .map_err(|e| VaultError::Decryption(format!("ciphertext is not valid base64: {e}")))
}
