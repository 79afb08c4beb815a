//! Core types for the key vault.
//!
//! Intention: strongly-typed wrappers over keystore references, PEM public
//! keys and ciphertexts. Nothing here can carry private key material.

use crate::cipher;
use crate::error::{Result, VaultError};
use crate::pem;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use std::fmt;

/* ------------------------------ Algorithm ------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa { bits } => write!(f, "RSA-{bits}"),
        }
    }
}

/* ---------------------------- Key pair handle --------------------------- */

/// Reference to a key pair held by a keystore. Only the public half is
/// reachable from here; the private half stays behind the keystore's API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairHandle {
    alias: String,
    algorithm: KeyAlgorithm,
    public_key: RsaPublicKey,
}

impl KeyPairHandle {
    pub fn new(alias: impl Into<String>, public_key: RsaPublicKey) -> Self {
        let bits = public_key.size() * 8;
        Self {
            alias: alias.into(),
            algorithm: KeyAlgorithm::Rsa { bits },
            public_key,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn public_key_record(&self) -> Result<PublicKeyRecord> {
        PublicKeyRecord::from_public_key(&self.public_key)
    }
}

/* --------------------------- Public key record -------------------------- */

/// A PEM-encoded public key as stored in preferences and shared with peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pem: String,
    der: Vec<u8>,
}

impl PublicKeyRecord {
    pub fn from_public_key(key: &RsaPublicKey) -> Result<Self> {
        let der = pem::public_key_der(key)?;
        Ok(Self {
            pem: pem::der_to_pem(&der),
            der,
        })
    }

    /// Parse and validate PEM text received from elsewhere.
    pub fn parse(pem_text: &str) -> Result<Self> {
        let key = pem::decode_public_key(pem_text)?;
        let der = pem::public_key_der(&key)?;
        Ok(Self {
            pem: pem_text.to_string(),
            der,
        })
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    pub fn into_pem(self) -> String {
        self.pem
    }

    pub fn public_key(&self) -> Result<RsaPublicKey> {
        pem::decode_public_key(&self.pem)
    }

    /// Lowercase hex SHA-256 of the DER SubjectPublicKeyInfo.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }

    /// First 16 hex characters of the fingerprint, for log lines.
    pub fn short_fingerprint(&self) -> String {
        let mut fp = self.fingerprint();
        fp.truncate(16);
        fp
    }
}

impl fmt::Display for PublicKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pem)
    }
}

/* --------------------------- Encrypted payload -------------------------- */

/// Base64 ciphertext of one RSA block. Carries no algorithm or key id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptedPayload(String);

impl EncryptedPayload {
    pub fn from_ciphertext(ciphertext: &[u8]) -> Self {
        Self(cipher::encode_payload(ciphertext))
    }

    /// Accept a base64 string received from elsewhere.
    pub fn parse(payload: &str) -> Result<Self> {
        let trimmed = payload.trim();
        cipher::decode_payload(trimmed)?;
        if trimmed.is_empty() {
            return Err(VaultError::Decryption("ciphertext is empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        cipher::decode_payload(&self.0)
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EncryptedPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
