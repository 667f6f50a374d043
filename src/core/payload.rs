//! Transaction payloads
//!
//! Only the token-transfer payload is modelled. Its recipient is a principal:
//! a standard address, or an address plus a contract name.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::address::StacksAddress;
use crate::crypto::c32::AddressError;

// =============================================================================
// Constants
// =============================================================================

/// Fixed wire width of a memo
pub const MEMO_LENGTH: usize = 34;

/// Longest contract name a principal may carry
pub const MAX_CONTRACT_NAME_LENGTH: usize = 128;

/// Payload type tag for token transfers
pub const PAYLOAD_TOKEN_TRANSFER: u8 = 0x00;

/// Principal type tags
pub const PRINCIPAL_STANDARD: u8 = 0x05;
pub const PRINCIPAL_CONTRACT: u8 = 0x06;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Memo is too long")]
    MemoTooLong,
    #[error("Invalid contract name: {0:?}")]
    InvalidContractName(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
}

// =============================================================================
// Memo
// =============================================================================

/// Transfer memo, stored without its zero padding
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Memo(Vec<u8>);

impl Memo {
    pub fn new(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() > MEMO_LENGTH {
            return Err(PayloadError::MemoTooLong);
        }
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        Ok(Self(bytes[..end].to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Memo zero-padded to its wire width
    pub fn to_wire(&self) -> [u8; MEMO_LENGTH] {
        let mut padded = [0u8; MEMO_LENGTH];
        padded[..self.0.len()].copy_from_slice(&self.0);
        padded
    }

    /// Memo as text, with invalid UTF-8 replaced
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl FromStr for Memo {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

// =============================================================================
// Principals
// =============================================================================

/// Recipient of a token transfer
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrincipalData {
    Standard(StacksAddress),
    Contract(StacksAddress, String),
}

impl PrincipalData {
    pub fn address(&self) -> &StacksAddress {
        match self {
            Self::Standard(address) | Self::Contract(address, _) => address,
        }
    }

    pub fn contract(address: StacksAddress, name: &str) -> Result<Self, PayloadError> {
        validate_contract_name(name)?;
        Ok(Self::Contract(address, name.to_string()))
    }
}

impl fmt::Display for PrincipalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(address) => write!(f, "{}", address),
            Self::Contract(address, name) => write!(f, "{}.{}", address, name),
        }
    }
}

impl FromStr for PrincipalData {
    type Err = PayloadError;

    /// `ADDRESS` or `ADDRESS.contract-name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((address, name)) => Self::contract(address.parse()?, name),
            None => Ok(Self::Standard(s.parse()?)),
        }
    }
}

impl Serialize for PrincipalData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Contract names start with a letter, then letters, digits, `-` or `_`
pub fn validate_contract_name(name: &str) -> Result<(), PayloadError> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_CONTRACT_NAME_LENGTH
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PayloadError::InvalidContractName(name.to_string()))
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Tagged transaction payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionPayload {
    TokenTransfer {
        recipient: PrincipalData,
        amount: u64,
        memo: Memo,
    },
}

impl TransactionPayload {
    pub fn payload_type(&self) -> u8 {
        match self {
            Self::TokenTransfer { .. } => PAYLOAD_TOKEN_TRANSFER,
        }
    }

    pub fn recipient(&self) -> Option<&PrincipalData> {
        match self {
            Self::TokenTransfer { recipient, .. } => Some(recipient),
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::TokenTransfer { amount, .. } => Some(*amount),
        }
    }

    pub fn memo(&self) -> Option<&Memo> {
        match self {
            Self::TokenTransfer { memo, .. } => Some(memo),
        }
    }
}
