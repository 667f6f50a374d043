//! stx-tx-builder: multi-party Stacks token transfers in Rust
//!
//! This crate builds STX token-transfer transactions and lets several
//! parties sign them one after another:
//! - Single-sig and M-of-N multisig spending conditions
//! - Canonical wire encoding and decoding
//! - Incremental signing over the presign/postsign sighash chain
//! - Public key recovery from partially signed transactions
//! - Hex and extended (xprv) private keys
//!
//! # Example
//!
//! ```rust
//! use stx_tx_builder::builder::TransferBuilder;
//! use stx_tx_builder::core::BaseTransaction;
//!
//! let mut builder = TransferBuilder::new();
//! builder
//!     .fee("180").unwrap()
//!     .nonce(0).unwrap()
//!     .to("STDE7Y8HV3RX8VBM2TZVWJTS7ZA1XB0SSC3NEVH0").unwrap()
//!     .amount("1000").unwrap()
//!     .memo("test").unwrap()
//!     .from_pub_keys([
//!         "02b087ca52f40fdfdf4b16a0bbf7e91e4db2e183ac5c6491a5f60a5450e25de7d0",
//!         "024abddd63b56c55cd1ed0803c26c473f5f0b9d8473b37b65bd812f035365f154b",
//!         "038e3c4529395611be9abf6fa3b6987e81d402385e3d605a073f42f407565a4a3d",
//!     ]).unwrap();
//!
//! // Unsigned: hand the hex to the first co-signer
//! let tx = builder.build().unwrap();
//! println!("{}", tx.to_broadcast_format());
//! ```

pub mod builder;
pub mod cli;
pub mod core;
pub mod crypto;

// Re-export commonly used types
pub use builder::{BuilderConfig, BuilderError, BuilderState, TransferBuilder};
pub use core::{
    BaseTransaction, Network, ParseError, PrincipalData, SigningError, StacksAddress,
    StacksTransaction, Transaction, TxJson,
};
pub use crypto::{KeyPair, MessageSignature, StacksPublicKey};
