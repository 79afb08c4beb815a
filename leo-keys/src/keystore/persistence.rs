//! On-disk helpers shared by the file keystore and the encrypted preferences:
//! the per-installation device secret, scoped AAD and atomic file replacement.

use crate::error::{Result, VaultError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub const DEVICE_SECRET_FILE: &str = "device.secret";
pub const DEVICE_SECRET_LEN: usize = 32;

/// What a sealed blob belongs to; bound into the AEAD tag.
pub enum Scope<'a> {
    PrivateKey { alias: &'a str },
    Preferences { name: &'a str },
}

pub fn build_aad(scope: &Scope) -> Vec<u8> {
    match scope {
        Scope::PrivateKey { alias } => format!("leo:keystore:v1|alias={alias}").into_bytes(),
        Scope::Preferences { name } => format!("leo:prefs:v1|name={name}").into_bytes(),
    }
}

/// 32-byte AES key stored next to the sealed files.
pub struct DeviceSecret {
    key: Zeroizing<[u8; DEVICE_SECRET_LEN]>,
    path: PathBuf,
}

impl DeviceSecret {
    /// Read `<dir>/device.secret`, creating it on first use.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(DEVICE_SECRET_FILE);
        if let Some(encoded) = read_optional(&path)? {
            let key = Self::decode(&encoded)?;
            return Ok(Self { key, path });
        }

        fs::create_dir_all(dir)?;
        let mut key = Zeroizing::new([0u8; DEVICE_SECRET_LEN]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        let encoded = Zeroizing::new(STANDARD.encode(&key[..]));
        write_atomic(&path, encoded.as_bytes())?;
        Ok(Self { key, path })
    }

    fn decode(encoded: &[u8]) -> Result<Zeroizing<[u8; DEVICE_SECRET_LEN]>> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(trim_ascii(encoded))
                .map_err(|e| VaultError::Keystore(format!("decode device secret: {e}")))?,
        );
        if decoded.len() != DEVICE_SECRET_LEN {
            return Err(VaultError::Keystore(
                "stored device secret has wrong length".into(),
            ));
        }
        let mut key = Zeroizing::new([0u8; DEVICE_SECRET_LEN]);
        key.copy_from_slice(&decoded);
        Ok(key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn seal(&self, plaintext: &[u8], scope: &Scope) -> Result<Vec<u8>> {
        super::aes_gcm_encrypt(&self.key[..], plaintext, &build_aad(scope))
    }

    pub fn open(&self, sealed: &[u8], scope: &Scope) -> Result<Zeroizing<Vec<u8>>> {
        let plain = super::aes_gcm_decrypt(&self.key[..], sealed, &build_aad(scope))?;
        Ok(Zeroizing::new(plain))
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Write via a temp file, fsync and rename so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut f = fs::File::create(&tmp_path)?;
        restrict_permissions(&f)?;
        f.write_all(bytes)?;
        f.flush()?;
        f.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> Result<()> {
    Ok(())
}

pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns `false` when the file was already gone.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
