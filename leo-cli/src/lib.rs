//! LeoConnect vault CLI library
//!
//! Configuration handling and the command implementations behind the
//! `leo-vault` binary.

pub mod commands;
pub mod config;

pub use commands::VaultCommand;
pub use config::CliConfig;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
