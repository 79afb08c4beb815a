//! LeoConnect vault CLI
//!
//! Manages the device RSA key pair used for end-to-end message encryption:
//! generate it, export the public key, and encrypt or decrypt messages.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leo_cli::config::{default_config_dir, CliConfig};
use leo_cli::VaultCommand;
use leo_common::logging::{Component, Logger};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "leo-vault")]
#[command(about = "LeoConnect key vault - manage the device message key pair")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration directory (default: ~/.leoconnect)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a vault configuration for this device
    #[command(name = "init")]
    Init {
        /// Force re-initialization even if config exists
        #[arg(short, long)]
        force: bool,
    },
    /// Generate (or replace) the device key pair and print its public key
    #[command(name = "generate")]
    Generate,
    /// Print the stored public key
    #[command(name = "public-key")]
    PublicKey,
    /// Show backend and key pair status
    #[command(name = "status")]
    Status,
    /// Encrypt a message for a recipient public key
    #[command(name = "encrypt")]
    Encrypt {
        /// PEM file of the recipient (default: this device)
        #[arg(short, long)]
        recipient: Option<PathBuf>,

        /// Message text
        message: String,
    },
    /// Decrypt a base64 message addressed to this device
    #[command(name = "decrypt")]
    Decrypt {
        /// Base64 ciphertext
        ciphertext: String,
    },
    /// Delete the device key pair and its stored public key
    #[command(name = "clear")]
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let logger = Arc::new(Logger::new_root(Component::Cli, "main"));

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {config_dir:?}"))?;

    let command = VaultCommand::new(config_dir.clone(), logger);

    let output = match cli.command {
        Some(Commands::Init { force }) => command.init(force).await?,
        Some(Commands::Generate) => command.generate().await?,
        Some(Commands::PublicKey) => command.public_key().await?,
        Some(Commands::Status) => command.status().await?,
        Some(Commands::Encrypt { recipient, message }) => {
            command.encrypt(&message, recipient.as_deref()).await?
        }
        Some(Commands::Decrypt { ciphertext }) => command.decrypt(&ciphertext).await?,
        Some(Commands::Clear) => command.clear().await?,
        None => {
            if CliConfig::exists(&config_dir) {
                "Configuration found. Use 'leo-vault status' to inspect the vault.".to_string()
            } else {
                "No configuration found. Use 'leo-vault init' to set up this device.".to_string()
            }
        }
    };
    println!("{output}");

    Ok(())
}
