use thiserror::Error;

/// Error types for the leo-keys crate
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("Preference store error: {0}")]
    Preferences(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Platform feature not available: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Short stable name of the variant, used in log lines and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::KeyGeneration(_) => "key_generation",
            VaultError::KeyNotFound(_) => "key_not_found",
            VaultError::Encryption(_) => "encryption",
            VaultError::Decryption(_) => "decryption",
            VaultError::Keystore(_) => "keystore",
            VaultError::Preferences(_) => "preferences",
            VaultError::InvalidKeyFormat(_) => "invalid_key_format",
            VaultError::InvalidConfig(_) => "invalid_config",
            VaultError::Unavailable(_) => "unavailable",
            VaultError::Serialization(_) => "serialization",
            VaultError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

impl From<aes_gcm::Error> for VaultError {
    fn from(_: aes_gcm::Error) -> Self {
        // aes-gcm deliberately carries no detail
        VaultError::Keystore("AEAD operation failed".to_string())
    }
}

/// Result type for leo-keys operations
pub type Result<T> = std::result::Result<T, VaultError>;
