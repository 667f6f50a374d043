//! Stacks transfer CLI
//!
//! Build, co-sign and inspect multisig STX token transfers from the command line.

use clap::{Parser, Subcommand};
use stx_tx_builder::cli::{self, BuildOptions};
use stx_tx_builder::core::Network;

#[derive(Parser)]
#[command(name = "stx-tx")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Build and co-sign Stacks token transfers", long_about = None)]
struct Cli {
    /// Network to target (mainnet or testnet)
    #[arg(short, long, default_value = "testnet", global = true)]
    network: Network,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new transfer, signing it with any keys given
    Build {
        /// Fee in micro-STX
        #[arg(short, long)]
        fee: String,

        /// Sender account nonce
        #[arg(long, default_value = "0")]
        nonce: u64,

        /// Recipient address (or address.contract)
        #[arg(short, long)]
        to: String,

        /// Amount in micro-STX
        #[arg(short, long)]
        amount: String,

        /// Optional memo (up to 34 bytes)
        #[arg(short, long)]
        memo: Option<String>,

        /// Sender public key, repeat in slot order
        #[arg(short = 'p', long = "pubkey")]
        public_keys: Vec<String>,

        /// Required signatures for a multisig sender
        #[arg(short = 'r', long)]
        threshold: Option<u16>,

        /// Private key (hex or xprv) to sign with, repeatable
        #[arg(short, long = "key")]
        keys: Vec<String>,
    },

    /// Add signatures to a serialized transfer
    Sign {
        /// Raw transaction hex
        raw: String,

        /// Private key (hex or xprv) to sign with, repeatable
        #[arg(short, long = "key")]
        keys: Vec<String>,

        /// Signature (65 bytes of hex) made by another party, repeatable
        #[arg(short, long = "signature")]
        signatures: Vec<String>,

        /// Sender public keys, when the raw transaction has no signatures yet
        #[arg(short = 'p', long = "pubkey")]
        public_keys: Vec<String>,
    },

    /// Decode a serialized transfer
    Decode {
        /// Raw transaction hex
        raw: String,
    },

    /// Generate a new key pair
    Keygen,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            fee,
            nonce,
            to,
            amount,
            memo,
            public_keys,
            threshold,
            keys,
        } => {
            let options = BuildOptions {
                network: cli.network,
                fee,
                nonce,
                to,
                amount,
                memo,
                public_keys,
                threshold,
                keys,
            };
            cli::cmd_build(&options)?;
        }
        Commands::Sign {
            raw,
            keys,
            signatures,
            public_keys,
        } => {
            cli::cmd_sign(&raw, &keys, &signatures, &public_keys)?;
        }
        Commands::Decode { raw } => {
            cli::cmd_decode(&raw)?;
        }
        Commands::Keygen => {
            cli::cmd_keygen(cli.network)?;
        }
    }

    Ok(())
}
