//! LeoConnect Keys – public API facade
//!
//! Device RSA key vault for end-to-end message encryption: the key pair lives
//! in a platform keystore, only the PEM public key is ever exported.

pub mod cipher;
pub mod config;
pub mod error;
pub mod handle;
pub mod keystore;
pub mod pem;
pub mod preferences;
pub mod types;
pub mod vault;

pub use error::{Result, VaultError};

pub use config::{BackendKind, VaultConfig};

pub use types::{EncryptedPayload, KeyAlgorithm, KeyPairHandle, PublicKeyRecord};

pub use keystore::{
    open_keystore, resolve_backend, FileKeystore, KeystoreCaps, MemoryKeystore, Platform,
    PlatformKeystore,
};

pub use preferences::{
    open_preferences, EncryptedFilePreferences, MemoryPreferences, PreferenceStore,
};

pub use handle::AsyncKeyVault;
pub use vault::{KeyVault, MessageKeyVault};
