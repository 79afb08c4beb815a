//! PEM marshalling of RSA public keys.
//!
//! Keys are written as a single base64 line of the DER SubjectPublicKeyInfo
//! between `PUBLIC KEY` markers. Reading is lenient about line wrapping and
//! line endings, and also accepts PKCS#1 `RSA PUBLIC KEY` blocks.

use crate::error::{Result, VaultError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::RsaPublicKey;

pub const SPKI_LABEL: &str = "PUBLIC KEY";
pub const PKCS1_LABEL: &str = "RSA PUBLIC KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Spki,
    Pkcs1,
}

/// DER SubjectPublicKeyInfo of `key`.
pub fn public_key_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    key.to_public_key_der()
        .map(|der| der.as_bytes().to_vec())
        .map_err(|e| VaultError::InvalidKeyFormat(format!("Public key DER encoding error: {e}")))
}

/// Wrap DER SubjectPublicKeyInfo bytes in PEM markers.
pub fn der_to_pem(der: &[u8]) -> String {
    format!(
        "-----BEGIN {SPKI_LABEL}-----\n{}\n-----END {SPKI_LABEL}-----",
        STANDARD.encode(der)
    )
}

pub fn encode_public_key(key: &RsaPublicKey) -> Result<String> {
    Ok(der_to_pem(&public_key_der(key)?))
}

/// Parse a PEM public key into an RSA key.
pub fn decode_public_key(pem: &str) -> Result<RsaPublicKey> {
    let (encoding, der) = pem_to_der(pem)?;
    match encoding {
        Encoding::Spki => RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| VaultError::InvalidKeyFormat(format!("invalid SubjectPublicKeyInfo: {e}"))),
        Encoding::Pkcs1 => RsaPublicKey::from_pkcs1_der(&der)
            .map_err(|e| VaultError::InvalidKeyFormat(format!("invalid PKCS#1 public key: {e}"))),
    }
}

fn pem_to_der(pem: &str) -> Result<(Encoding, Vec<u8>)> {
    let (encoding, body) = extract_body(pem)?;
    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| VaultError::InvalidKeyFormat(format!("invalid base64 in PEM body: {e}")))?;
    Ok((encoding, der))
}

fn extract_body(pem: &str) -> Result<(Encoding, String)> {
    for (encoding, label) in [(Encoding::Spki, SPKI_LABEL), (Encoding::Pkcs1, PKCS1_LABEL)] {
        let begin = format!("-----BEGIN {label}-----");
        let end = format!("-----END {label}-----");

        let Some(start) = pem.find(&begin) else {
            continue;
        };
        let rest = &pem[start + begin.len()..];
        let stop = rest
            .find(&end)
            .ok_or_else(|| VaultError::InvalidKeyFormat(format!("missing '{end}' marker")))?;

        let body: String = rest[..stop].chars().filter(|c| !c.is_whitespace()).collect();
        if body.is_empty() {
            return Err(VaultError::InvalidKeyFormat("empty PEM body".into()));
        }
        return Ok((encoding, body));
    }

    Err(VaultError::InvalidKeyFormat(format!(
        "missing '-----BEGIN {SPKI_LABEL}-----' marker"
    )))
}
