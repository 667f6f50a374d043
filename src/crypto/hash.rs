//! Hashing utilities for Stacks transactions
//!
//! Provides the digests used across the wire format:
//! - SHA-512/256 for transaction ids and the signature hash chain
//! - HASH160 (RIPEMD160 of SHA-256) for signer and address hashes
//! - double SHA-256 for c32check and base58check checksums

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512_256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-512/256, the digest behind Stacks txids and sighashes
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes SHA-512/256 and returns it as a hex string
pub fn sha512_256_hex(data: &[u8]) -> String {
    hex::encode(sha512_256(data))
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().into()
}
