//! Network parameters
//!
//! The transaction version byte, chain id, address versions and coin names
//! for mainnet and testnet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Constants
// =============================================================================

pub const CHAIN_ID_MAINNET: u32 = 0x0000_0001;
pub const CHAIN_ID_TESTNET: u32 = 0x8000_0000;

/// Address versions (c32 version characters P, M, T, N)
pub const ADDRESS_VERSION_MAINNET_SINGLESIG: u8 = 22;
pub const ADDRESS_VERSION_MAINNET_MULTISIG: u8 = 20;
pub const ADDRESS_VERSION_TESTNET_SINGLESIG: u8 = 26;
pub const ADDRESS_VERSION_TESTNET_MULTISIG: u8 = 21;

pub const COIN_MAINNET: &str = "stx";
pub const COIN_TESTNET: &str = "tstx";

/// Leading version byte of every serialized transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionVersion {
    Mainnet = 0x00,
    Testnet = 0x80,
}

impl TransactionVersion {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Mainnet),
            0x80 => Some(Self::Testnet),
            _ => None,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Self::Mainnet)
    }
}

/// Network configuration a transaction is built for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub version: TransactionVersion,
    pub chain_id: u32,
}

impl Network {
    pub fn mainnet() -> Self {
        Self {
            version: TransactionVersion::Mainnet,
            chain_id: CHAIN_ID_MAINNET,
        }
    }

    pub fn testnet() -> Self {
        Self {
            version: TransactionVersion::Testnet,
            chain_id: CHAIN_ID_TESTNET,
        }
    }

    /// Network implied by a transaction version byte
    pub fn for_version(version: TransactionVersion) -> Self {
        match version {
            TransactionVersion::Mainnet => Self::mainnet(),
            TransactionVersion::Testnet => Self::testnet(),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.version.is_mainnet()
    }

    pub fn coin_name(&self) -> &'static str {
        if self.is_mainnet() {
            COIN_MAINNET
        } else {
            COIN_TESTNET
        }
    }

    pub fn single_sig_version(&self) -> u8 {
        if self.is_mainnet() {
            ADDRESS_VERSION_MAINNET_SINGLESIG
        } else {
            ADDRESS_VERSION_TESTNET_SINGLESIG
        }
    }

    pub fn multisig_version(&self) -> u8 {
        if self.is_mainnet() {
            ADDRESS_VERSION_MAINNET_MULTISIG
        } else {
            ADDRESS_VERSION_TESTNET_MULTISIG
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::testnet()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_mainnet() {
            write!(f, "mainnet")
        } else {
            write!(f, "testnet")
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::mainnet()),
            "testnet" | "test" => Ok(Self::testnet()),
            other => Err(format!("Unknown network: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let testnet = Network::default();
        assert_eq!(testnet.version as u8, 0x80);
        assert_eq!(testnet.chain_id, 0x8000_0000);
        assert_eq!(testnet.coin_name(), "tstx");
        assert_eq!(testnet.single_sig_version(), 26);
        assert_eq!(testnet.multisig_version(), 21);

        let mainnet = Network::mainnet();
        assert_eq!(mainnet.version as u8, 0x00);
        assert_eq!(mainnet.chain_id, 1);
        assert_eq!(mainnet.coin_name(), "stx");
        assert_eq!(mainnet.single_sig_version(), 22);
        assert_eq!(mainnet.multisig_version(), 20);
    }

    #[test]
    fn test_parse_network() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::mainnet());
        assert_eq!("Testnet".parse::<Network>().unwrap(), Network::testnet());
        assert!("regtest".parse::<Network>().is_err());
    }

    #[test]
    fn test_version_byte() {
        assert_eq!(TransactionVersion::from_u8(0x80), Some(TransactionVersion::Testnet));
        assert_eq!(TransactionVersion::from_u8(0x01), None);
        assert_eq!(
            Network::for_version(TransactionVersion::Mainnet),
            Network::mainnet()
        );
    }
}
