//! The transaction envelope
//!
//! `StacksTransaction` is the full wire model: version and chain id, the
//! origin spending condition, anchor and post-condition modes, and the
//! payload. Post-conditions are always the empty list.

use super::address::StacksAddress;
use super::auth::{HashMode, SpendingCondition};
use super::codec;
use super::network::{Network, TransactionVersion};
use super::payload::TransactionPayload;
use crate::crypto::hash::{sha512_256, sha512_256_hex};

/// Where the transaction may be mined
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AnchorMode {
    OnChainOnly = 0x01,
    OffChainOnly = 0x02,
    #[default]
    Any = 0x03,
}

impl AnchorMode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::OnChainOnly),
            0x02 => Some(Self::OffChainOnly),
            0x03 => Some(Self::Any),
            _ => None,
        }
    }
}

/// Whether assets not covered by post-conditions may move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PostConditionMode {
    Allow = 0x01,
    #[default]
    Deny = 0x02,
}

impl PostConditionMode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Allow),
            0x02 => Some(Self::Deny),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StacksTransaction {
    pub version: TransactionVersion,
    pub chain_id: u32,
    pub auth: SpendingCondition,
    pub anchor_mode: AnchorMode,
    pub post_condition_mode: PostConditionMode,
    pub payload: TransactionPayload,
}

impl StacksTransaction {
    pub fn new(network: Network, auth: SpendingCondition, payload: TransactionPayload) -> Self {
        Self {
            version: network.version,
            chain_id: network.chain_id,
            auth,
            anchor_mode: AnchorMode::default(),
            post_condition_mode: PostConditionMode::default(),
            payload,
        }
    }

    /// Canonical wire bytes
    pub fn serialize(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// SHA-512/256 of the canonical encoding
    pub fn txid(&self) -> [u8; 32] {
        sha512_256(&self.serialize())
    }

    pub fn txid_hex(&self) -> String {
        sha512_256_hex(&self.serialize())
    }

    pub fn network(&self) -> Network {
        Network::for_version(self.version)
    }

    /// Address of the paying account
    ///
    /// P2PKH signers use the single-sig address version; every other hash
    /// mode uses the multisig version.
    pub fn sender_address(&self) -> StacksAddress {
        let multisig = self.auth.hash_mode() != HashMode::P2PKH;
        StacksAddress::for_network(self.network(), multisig, *self.auth.signer())
    }

    /// Same transaction with the spending condition cleared
    pub fn cleared(&self) -> Self {
        Self {
            auth: self.auth.clear(),
            ..self.clone()
        }
    }
}
