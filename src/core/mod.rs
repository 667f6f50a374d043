//! Core transaction components
//!
//! This module contains the building blocks of a Stacks transfer:
//! - Network parameters (version byte, chain id, address versions)
//! - Addresses and principals
//! - Spending conditions (single-sig and multisig)
//! - The transaction envelope and its canonical codec
//! - The origin signer (sighash chain, recovery, verification)
//! - The finished transaction view

pub mod address;
pub mod auth;
pub mod codec;
pub mod envelope;
pub mod network;
pub mod payload;
pub mod signer;
pub mod transaction;

pub use address::{StacksAddress, MAX_MULTISIG_KEYS};
pub use auth::{AuthError, AuthField, HashMode, PublicKeyEncoding, SpendingCondition};
pub use codec::{decode, decode_hex, encode, encode_hex, ParseError};
pub use envelope::{AnchorMode, PostConditionMode, StacksTransaction};
pub use network::{Network, TransactionVersion};
pub use payload::{Memo, PayloadError, PrincipalData, TransactionPayload, MEMO_LENGTH};
pub use signer::{BatchError, Queued, SigningError, TransactionSigner};
pub use transaction::{BaseTransaction, Entry, Transaction, TransactionType, TxJson};
