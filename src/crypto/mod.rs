//! Cryptographic utilities for Stacks transactions
//!
//! This module provides:
//! - SHA-256, SHA-512/256 and HASH160 digests
//! - c32check text encoding for addresses
//! - ECDSA key management and recoverable signatures (secp256k1)

pub mod c32;
pub mod hash;
pub mod keys;

pub use c32::{c32_address, c32_address_decode, AddressError};
pub use hash::{double_sha256, hash160, sha256, sha512_256, sha512_256_hex};
pub use keys::{sign_recoverable, KeyError, KeyPair, MessageSignature, StacksPublicKey};
