//! Spending conditions
//!
//! A spending condition names the account paying for a transaction (the
//! signer hash), its nonce and fee, and the authorization material:
//! - single-sig: one key encoding and one signature slot
//! - multisig: an ordered list of auth fields and a signature threshold
//!
//! Multisig fields start out as public-key placeholders, one per key in the
//! order the keys were supplied. Signing replaces a key's placeholder with its
//! signature in place.

use thiserror::Error;

use super::address::{
    multisig_redeem_script, witness_program_hash, witness_script_hash, MAX_MULTISIG_KEYS,
};
use crate::crypto::hash::hash160;
use crate::crypto::keys::{MessageSignature, StacksPublicKey};

// =============================================================================
// Constants
// =============================================================================

/// Authorization type for an origin-only (non-sponsored) transaction
pub const AUTH_STANDARD: u8 = 0x04;

/// Auth field tags
pub const FIELD_PUBLIC_KEY_COMPRESSED: u8 = 0x00;
pub const FIELD_PUBLIC_KEY_UNCOMPRESSED: u8 = 0x01;
pub const FIELD_SIGNATURE_COMPRESSED: u8 = 0x02;
pub const FIELD_SIGNATURE_UNCOMPRESSED: u8 = 0x03;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while constructing a spending condition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("At least one public key is required")]
    NoPublicKeys,
    #[error("Too many public keys: {0}")]
    TooManyKeys(usize),
    #[error("Duplicate public key: {0}")]
    DuplicateKey(String),
}

// =============================================================================
// Modes and Encodings
// =============================================================================

/// How the signer hash is derived from the key material
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashMode {
    P2PKH = 0x00,
    P2SH = 0x01,
    P2WPKH = 0x02,
    P2WSH = 0x03,
}

impl HashMode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::P2PKH),
            0x01 => Some(Self::P2SH),
            0x02 => Some(Self::P2WPKH),
            0x03 => Some(Self::P2WSH),
            _ => None,
        }
    }

    pub fn is_multisig(&self) -> bool {
        matches!(self, Self::P2SH | Self::P2WSH)
    }
}

/// Which public key encoding a signature commits to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PublicKeyEncoding {
    Compressed = 0x00,
    Uncompressed = 0x01,
}

impl PublicKeyEncoding {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Compressed),
            0x01 => Some(Self::Uncompressed),
            _ => None,
        }
    }

    pub fn for_key(key: &StacksPublicKey) -> Self {
        if key.compressed {
            Self::Compressed
        } else {
            Self::Uncompressed
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed)
    }
}

/// One slot of a multisig spending condition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthField {
    PublicKey(StacksPublicKey),
    Signature(PublicKeyEncoding, MessageSignature),
}

impl AuthField {
    pub fn tag(&self) -> u8 {
        match self {
            Self::PublicKey(key) if key.compressed => FIELD_PUBLIC_KEY_COMPRESSED,
            Self::PublicKey(_) => FIELD_PUBLIC_KEY_UNCOMPRESSED,
            Self::Signature(PublicKeyEncoding::Compressed, _) => FIELD_SIGNATURE_COMPRESSED,
            Self::Signature(PublicKeyEncoding::Uncompressed, _) => FIELD_SIGNATURE_UNCOMPRESSED,
        }
    }

    pub fn is_signature(&self) -> bool {
        matches!(self, Self::Signature(..))
    }

    pub fn signature(&self) -> Option<&MessageSignature> {
        match self {
            Self::Signature(_, signature) => Some(signature),
            Self::PublicKey(_) => None,
        }
    }

    pub fn public_key(&self) -> Option<&StacksPublicKey> {
        match self {
            Self::PublicKey(key) => Some(key),
            Self::Signature(..) => None,
        }
    }
}

// =============================================================================
// Spending Conditions
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleSigSpendingCondition {
    pub hash_mode: HashMode,
    pub signer: [u8; 20],
    pub nonce: u64,
    pub fee: u64,
    pub key_encoding: PublicKeyEncoding,
    /// All zeros until signed
    pub signature: MessageSignature,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiSigSpendingCondition {
    pub hash_mode: HashMode,
    pub signer: [u8; 20],
    pub nonce: u64,
    pub fee: u64,
    pub fields: Vec<AuthField>,
    pub signatures_required: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpendingCondition {
    Singlesig(SingleSigSpendingCondition),
    Multisig(MultiSigSpendingCondition),
}

impl SpendingCondition {
    /// Unsigned P2PKH condition for one key
    pub fn new_singlesig(public_key: &StacksPublicKey) -> Self {
        Self::Singlesig(SingleSigSpendingCondition {
            hash_mode: HashMode::P2PKH,
            signer: hash160(&public_key.to_bytes()),
            nonce: 0,
            fee: 0,
            key_encoding: PublicKeyEncoding::for_key(public_key),
            signature: MessageSignature::empty(),
        })
    }

    /// Unsigned P2SH condition with one placeholder per key, in order
    pub fn new_multisig(threshold: u16, keys: &[StacksPublicKey]) -> Result<Self, AuthError> {
        validate_multisig(threshold, keys)?;
        let signer = signer_hash(HashMode::P2SH, threshold, keys)
            .ok_or(AuthError::TooManyKeys(keys.len()))?;
        Ok(Self::Multisig(MultiSigSpendingCondition {
            hash_mode: HashMode::P2SH,
            signer,
            nonce: 0,
            fee: 0,
            fields: keys.iter().copied().map(AuthField::PublicKey).collect(),
            signatures_required: threshold,
        }))
    }

    pub fn hash_mode(&self) -> HashMode {
        match self {
            Self::Singlesig(c) => c.hash_mode,
            Self::Multisig(c) => c.hash_mode,
        }
    }

    pub fn signer(&self) -> &[u8; 20] {
        match self {
            Self::Singlesig(c) => &c.signer,
            Self::Multisig(c) => &c.signer,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Self::Singlesig(c) => c.nonce,
            Self::Multisig(c) => c.nonce,
        }
    }

    pub fn fee(&self) -> u64 {
        match self {
            Self::Singlesig(c) => c.fee,
            Self::Multisig(c) => c.fee,
        }
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        match self {
            Self::Singlesig(c) => c.nonce = nonce,
            Self::Multisig(c) => c.nonce = nonce,
        }
    }

    pub fn set_fee(&mut self, fee: u64) {
        match self {
            Self::Singlesig(c) => c.fee = fee,
            Self::Multisig(c) => c.fee = fee,
        }
    }

    pub fn is_multisig(&self) -> bool {
        matches!(self, Self::Multisig(_))
    }

    /// Signatures required to authorize the transaction
    pub fn threshold(&self) -> u16 {
        match self {
            Self::Singlesig(_) => 1,
            Self::Multisig(c) => c.signatures_required,
        }
    }

    /// Signatures present, in stored order
    pub fn signatures(&self) -> Vec<MessageSignature> {
        match self {
            Self::Singlesig(c) if c.signature.is_empty() => Vec::new(),
            Self::Singlesig(c) => vec![c.signature],
            Self::Multisig(c) => c
                .fields
                .iter()
                .filter_map(AuthField::signature)
                .copied()
                .collect(),
        }
    }

    pub fn signature_count(&self) -> usize {
        self.signatures().len()
    }

    /// Copy with nonce, fee and all signing material reset
    ///
    /// This is the form the initial signature hash is computed over.
    pub fn clear(&self) -> Self {
        match self {
            Self::Singlesig(c) => Self::Singlesig(SingleSigSpendingCondition {
                nonce: 0,
                fee: 0,
                signature: MessageSignature::empty(),
                ..c.clone()
            }),
            Self::Multisig(c) => Self::Multisig(MultiSigSpendingCondition {
                nonce: 0,
                fee: 0,
                fields: Vec::new(),
                ..c.clone()
            }),
        }
    }
}

/// Threshold and key-list rules for a multisig condition
pub fn validate_multisig(threshold: u16, keys: &[StacksPublicKey]) -> Result<(), AuthError> {
    if keys.is_empty() {
        return Err(AuthError::NoPublicKeys);
    }
    if keys.len() > MAX_MULTISIG_KEYS {
        return Err(AuthError::TooManyKeys(keys.len()));
    }
    if threshold == 0 {
        return Err(AuthError::InvalidThreshold(
            "threshold must be at least 1".to_string(),
        ));
    }
    if threshold as usize > keys.len() {
        return Err(AuthError::InvalidThreshold(format!(
            "threshold {} exceeds key count {}",
            threshold,
            keys.len()
        )));
    }
    for (i, key) in keys.iter().enumerate() {
        if keys[..i].iter().any(|other| other.same_point(key)) {
            return Err(AuthError::DuplicateKey(key.to_hex()));
        }
    }
    Ok(())
}

/// Signer hash a condition with this hash mode commits to
///
/// Single-key modes use the first key only.
pub fn signer_hash(
    hash_mode: HashMode,
    threshold: u16,
    keys: &[StacksPublicKey],
) -> Option<[u8; 20]> {
    match hash_mode {
        HashMode::P2PKH => keys.first().map(|k| hash160(&k.to_bytes())),
        HashMode::P2WPKH => keys
            .first()
            .map(|k| witness_program_hash(&hash160(&k.to_bytes()))),
        HashMode::P2SH => multisig_redeem_script(threshold, keys).map(|s| hash160(&s)),
        HashMode::P2WSH => witness_script_hash(threshold, keys),
    }
}
