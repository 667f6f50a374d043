//! CLI commands for building and signing transfers
//!
//! Implements the command handlers for the CLI interface.

use crate::builder::{BuilderConfig, TransferBuilder};
use crate::core::address::StacksAddress;
use crate::core::network::Network;
use crate::core::transaction::{BaseTransaction, Transaction};
use crate::crypto::KeyPair;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Inputs for a new transfer
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub network: Network,
    pub fee: String,
    pub nonce: u64,
    pub to: String,
    pub amount: String,
    pub memo: Option<String>,
    /// Sender public keys, in slot order
    pub public_keys: Vec<String>,
    pub threshold: Option<u16>,
    /// Private keys to sign with
    pub keys: Vec<String>,
}

/// Build (and optionally sign) a new transfer
pub fn cmd_build(options: &BuildOptions) -> CliResult<()> {
    let config = BuilderConfig {
        network: options.network,
        ..Default::default()
    };
    let mut builder = TransferBuilder::with_config(config);
    builder
        .fee(&options.fee)?
        .nonce(options.nonce)?
        .to(&options.to)?
        .amount(&options.amount)?;

    if let Some(memo) = &options.memo {
        builder.memo(memo)?;
    }
    if !options.public_keys.is_empty() {
        builder.from_pub_keys(&options.public_keys)?;
    }
    if let Some(threshold) = options.threshold {
        builder.number_signatures(threshold)?;
    }
    for key in &options.keys {
        builder.sign(key)?;
    }

    let tx = builder.build()?;
    println!("✅ Transaction built!");
    print_transaction(&tx)?;
    Ok(())
}

/// Resume a serialized transfer and add signatures from keys or made elsewhere
pub fn cmd_sign(
    raw: &str,
    keys: &[String],
    signatures: &[String],
    public_keys: &[String],
) -> CliResult<()> {
    let mut builder = TransferBuilder::from_raw(raw)?;
    if !public_keys.is_empty() {
        builder.from_pub_keys(public_keys)?;
    }
    for key in keys {
        builder.sign(key)?;
    }
    for signature in signatures {
        builder.sign_with_signature(signature)?;
    }

    let tx = builder.build()?;
    println!("✍️  Transaction signed!");
    print_transaction(&tx)?;
    Ok(())
}

/// Decode a serialized transfer and report its signing status
pub fn cmd_decode(raw: &str) -> CliResult<()> {
    let tx = Transaction::from_raw(raw)?;
    println!("🔍 Decoded transaction");
    print_transaction(&tx)?;

    match tx.public_keys() {
        Ok(keys) if !keys.is_empty() => {
            println!("\n🔑 Signer public keys:");
            for (slot, key) in keys.iter().enumerate() {
                println!("   [{}] {}", slot, key.to_hex());
            }
        }
        Ok(_) => {}
        Err(e) => println!("\n⚠️  Could not recover signer keys: {}", e),
    }

    match tx.verify_signatures() {
        Ok(()) => println!("\n✅ Signatures valid"),
        Err(e) => println!("\n⏳ Not ready to broadcast: {}", e),
    }
    Ok(())
}

/// Generate a fresh key pair
pub fn cmd_keygen(network: Network) -> CliResult<()> {
    let key_pair = KeyPair::generate();
    let address = StacksAddress::from_public_key(network, &key_pair.public_key);

    println!("🔐 New key pair ({})", network);
    println!("   📍 Address: {}", address);
    println!("   🔑 Public Key: {}", key_pair.public_key_hex());
    println!("   🗝️  Private Key: {}", key_pair.private_key_hex());
    println!("\n   ⚠️  IMPORTANT: Store the private key somewhere safe.");
    Ok(())
}

fn print_transaction(tx: &Transaction) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&tx.to_json())?);
    println!(
        "\n   ├─ Signatures: {}/{}",
        tx.signature_count(),
        tx.threshold()
    );
    println!("   └─ Raw: {}", tx.to_broadcast_format());
    Ok(())
}
