//! Stacks addresses
//!
//! A `StacksAddress` is an address version plus a 20-byte hash. Its text
//! form is `S` followed by the c32check encoding of both.

use crate::crypto::c32::{c32_address, c32_address_decode, AddressError, MAX_C32_VERSION};
use crate::crypto::hash::{hash160, sha256};
use crate::crypto::keys::StacksPublicKey;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::network::{
    Network, ADDRESS_VERSION_MAINNET_MULTISIG, ADDRESS_VERSION_MAINNET_SINGLESIG,
    ADDRESS_VERSION_TESTNET_MULTISIG, ADDRESS_VERSION_TESTNET_SINGLESIG,
};

/// Script opcodes used by the multisig redeem script
const OP_1: u8 = 0x51;
const OP_CHECKMULTISIG: u8 = 0xae;

/// Largest key count a redeem script can express with small-integer opcodes
pub const MAX_MULTISIG_KEYS: usize = 15;

/// A version byte and HASH160, as carried by principals and spending conditions
///
/// The version always fits a single c32 character, so every address can be
/// printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    version: u8,
    hash160: [u8; 20],
}

impl StacksAddress {
    pub fn new(version: u8, hash160: [u8; 20]) -> Result<Self, AddressError> {
        if version > MAX_C32_VERSION {
            return Err(AddressError::InvalidVersion(version));
        }
        Ok(Self { version, hash160 })
    }

    /// Address of `hash160` with the network's single-sig or multisig version
    pub fn for_network(network: Network, multisig: bool, hash160: [u8; 20]) -> Self {
        let version = if multisig {
            network.multisig_version()
        } else {
            network.single_sig_version()
        };
        Self { version, hash160 }
    }

    /// Whether the version is one of the four known address versions
    pub fn is_known_version(version: u8) -> bool {
        matches!(
            version,
            ADDRESS_VERSION_MAINNET_SINGLESIG
                | ADDRESS_VERSION_MAINNET_MULTISIG
                | ADDRESS_VERSION_TESTNET_SINGLESIG
                | ADDRESS_VERSION_TESTNET_MULTISIG
        )
    }

    /// Single-key (P2PKH) address
    pub fn from_public_key(network: Network, public_key: &StacksPublicKey) -> Self {
        Self::for_network(network, false, hash160(&public_key.to_bytes()))
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash160(&self) -> &[u8; 20] {
        &self.hash160
    }

    pub fn hash160_hex(&self) -> String {
        hex::encode(self.hash160)
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = c32_address(self.version, &self.hash160).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl FromStr for StacksAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, hash160) = c32_address_decode(s.trim())?;
        if !Self::is_known_version(version) {
            return Err(AddressError::InvalidVersion(version));
        }
        Self::new(version, hash160)
    }
}

impl Serialize for StacksAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `OP_m <push key>... OP_n OP_CHECKMULTISIG`
///
/// `None` when `m` or `n` falls outside `1..=15`.
pub fn multisig_redeem_script(threshold: u16, keys: &[StacksPublicKey]) -> Option<Vec<u8>> {
    let m = small_int_opcode(usize::from(threshold))?;
    let n = small_int_opcode(keys.len())?;

    let mut script = Vec::with_capacity(3 + keys.len() * 34);
    script.push(m);
    for key in keys {
        let bytes = key.to_bytes();
        script.push(bytes.len() as u8);
        script.extend_from_slice(&bytes);
    }
    script.push(n);
    script.push(OP_CHECKMULTISIG);
    Some(script)
}

fn small_int_opcode(value: usize) -> Option<u8> {
    (1..=MAX_MULTISIG_KEYS)
        .contains(&value)
        .then(|| OP_1 + (value - 1) as u8)
}

/// HASH160 of a segwit-style program `0x00 <len> <program>`
pub fn witness_program_hash(program: &[u8]) -> [u8; 20] {
    let mut witness = Vec::with_capacity(program.len() + 2);
    witness.push(0x00);
    witness.push(program.len() as u8);
    witness.extend_from_slice(program);
    hash160(&witness)
}

/// P2WSH program hash for a multisig redeem script
pub fn witness_script_hash(threshold: u16, keys: &[StacksPublicKey]) -> Option<[u8; 20]> {
    let script = multisig_redeem_script(threshold, keys)?;
    Some(witness_program_hash(&sha256(&script)))
}
