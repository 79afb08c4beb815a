//! Vault configuration.
//!
//! Names the keystore alias and preference key the vault works under, the RSA
//! modulus size, where file-backed stores live and which backend to open.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_KEY_ALIAS: &str = "leoconnect_message_key";
pub const DEFAULT_PUBLIC_KEY_PREF: &str = "leoconnect_public_key_pem";
pub const DEFAULT_KEY_BITS: usize = 2048;

pub const MIN_KEY_BITS: usize = 1024;
pub const MAX_KEY_BITS: usize = 4096;

pub const ENV_DATA_DIR: &str = "LEO_VAULT_DIR";
pub const ENV_BACKEND: &str = "LEO_VAULT_BACKEND";
pub const ENV_KEY_BITS: &str = "LEO_VAULT_KEY_BITS";
pub const ENV_KEY_ALIAS: &str = "LEO_VAULT_KEY_ALIAS";

/// Which keystore backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pick the best backend compiled in for the current platform
    #[default]
    Auto,
    /// Process-local keystore and preferences
    Memory,
    /// Sealed files under `data_dir`
    File,
    /// OS credential store via the `keyring` crate
    Keyring,
    /// Apple Keychain
    Keychain,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Keyring => "keyring",
            BackendKind::Keychain => "keychain",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "keyring" => Ok(BackendKind::Keyring),
            "keychain" => Ok(BackendKind::Keychain),
            other => Err(VaultError::InvalidConfig(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Keystore alias of the single device key pair
    pub key_alias: String,
    /// Preference key holding the PEM public key
    pub public_key_pref: String,
    /// RSA modulus size in bits
    pub key_bits: usize,
    /// Directory for file-backed stores and the device secret
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: BackendKind,
}

impl VaultConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_alias: DEFAULT_KEY_ALIAS.to_string(),
            public_key_pref: DEFAULT_PUBLIC_KEY_PREF.to_string(),
            key_bits: DEFAULT_KEY_BITS,
            data_dir: data_dir.into(),
            backend: BackendKind::Auto,
        }
    }

    /// Config for a process-local vault; nothing touches the filesystem.
    pub fn in_memory() -> Self {
        Self::new(std::env::temp_dir()).with_backend(BackendKind::Memory)
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    pub fn with_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = alias.into();
        self
    }

    pub fn with_public_key_pref(mut self, pref: impl Into<String>) -> Self {
        self.public_key_pref = pref.into();
        self
    }

    /// Build a config from `LEO_VAULT_*` environment variables, falling back to
    /// `default_dir` and the defaults above.
    pub fn from_env(default_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = std::env::var_os(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_dir.into());
        let mut config = Self::new(data_dir);

        if let Ok(backend) = std::env::var(ENV_BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Ok(bits) = std::env::var(ENV_KEY_BITS) {
            config.key_bits = bits.trim().parse().map_err(|e| {
                VaultError::InvalidConfig(format!("{ENV_KEY_BITS}='{bits}': {e}"))
            })?;
        }
        if let Ok(alias) = std::env::var(ENV_KEY_ALIAS) {
            config.key_alias = alias;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_alias.trim().is_empty() {
            return Err(VaultError::InvalidConfig("key alias is empty".into()));
        }
        if self.public_key_pref.trim().is_empty() {
            return Err(VaultError::InvalidConfig(
                "public key preference name is empty".into(),
            ));
        }
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.key_bits) || self.key_bits % 256 != 0 {
            return Err(VaultError::InvalidConfig(format!(
                "key size {} must be a multiple of 256 between {MIN_KEY_BITS} and {MAX_KEY_BITS}",
                self.key_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_rsa_2048_under_fixed_names() {
        let config = VaultConfig::new("/tmp/leo");
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.key_alias, DEFAULT_KEY_ALIAS);
        assert_eq!(config.public_key_pref, DEFAULT_PUBLIC_KEY_PREF);
        assert_eq!(config.backend, BackendKind::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_odd_key_sizes() {
        for bits in [512, 1000, 2047, 8192] {
            let config = VaultConfig::new("/tmp/leo").with_key_bits(bits);
            assert!(
                matches!(config.validate(), Err(VaultError::InvalidConfig(_))),
                "{bits} should be rejected"
            );
        }
        assert!(VaultConfig::new("/tmp").with_key_bits(3072).validate().is_ok());
    }

    #[test]
    fn rejects_blank_names() {
        let config = VaultConfig::new("/tmp").with_key_alias("  ");
        assert!(config.validate().is_err());
        let config = VaultConfig::new("/tmp").with_public_key_pref("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("FILE".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!(" keychain ".parse::<BackendKind>().unwrap(), BackendKind::Keychain);
        assert!("sqlite".parse::<BackendKind>().is_err());
        for kind in [
            BackendKind::Auto,
            BackendKind::Memory,
            BackendKind::File,
            BackendKind::Keyring,
            BackendKind::Keychain,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn config_serializes_backend_in_lowercase() {
        let config = VaultConfig::new("/data").with_backend(BackendKind::File);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"backend\":\"file\""));
        let back: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    // The only test touching LEO_VAULT_* so it cannot race with itself.
    #[test]
    fn from_env_overrides_defaults_and_validates() {
        std::env::set_var(ENV_DATA_DIR, "/var/leo");
        std::env::set_var(ENV_BACKEND, "memory");
        std::env::set_var(ENV_KEY_BITS, "3072");
        std::env::set_var(ENV_KEY_ALIAS, "alt_alias");
        let config = VaultConfig::from_env("/ignored").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/leo"));
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.key_bits, 3072);
        assert_eq!(config.key_alias, "alt_alias");

        std::env::set_var(ENV_KEY_BITS, "lots");
        assert!(matches!(
            VaultConfig::from_env("/ignored"),
            Err(VaultError::InvalidConfig(_))
        ));

        for var in [ENV_DATA_DIR, ENV_BACKEND, ENV_KEY_BITS, ENV_KEY_ALIAS] {
            std::env::remove_var(var);
        }
        let config = VaultConfig::from_env("/fallback").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/fallback"));
        assert_eq!(config.backend, BackendKind::Auto);
    }

    #[test]
    fn missing_backend_field_defaults_to_auto() {
        let json = r#"{"key_alias":"a","public_key_pref":"p","key_bits":2048,"data_dir":"/d"}"#;
        let config: VaultConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, BackendKind::Auto);
    }
}
