//! Transaction view
//!
//! An immutable, finished transaction as handed back by the builder:
//! - JSON summary (`to_json`)
//! - broadcast hex (`to_broadcast_format`)
//! - signatures, inputs and outputs
//! - signature recovery and verification

use serde::{Deserialize, Serialize};
use std::fmt;

use super::codec::{self, ParseError};
use super::envelope::StacksTransaction;
use super::payload::TransactionPayload;
use super::signer::{self, SigningError};
use crate::crypto::keys::StacksPublicKey;

// =============================================================================
// Capability Trait
// =============================================================================

/// Kind of transaction, from the wallet's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Send,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "Send"),
        }
    }
}

/// One side of a value movement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub address: String,
    pub value: String,
    pub coin: String,
}

/// What every finished transaction can report about itself
pub trait BaseTransaction {
    fn id(&self) -> String;
    fn tx_type(&self) -> TransactionType;
    /// Signatures present, as hex
    fn signature(&self) -> Vec<String>;
    fn inputs(&self) -> &[Entry];
    fn outputs(&self) -> &[Entry];
    fn to_json(&self) -> TxJson;
    fn to_broadcast_format(&self) -> String;
}

// =============================================================================
// JSON View
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadJson {
    pub payload_type: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memo: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxJson {
    pub id: String,
    /// Decimal string
    pub fee: String,
    pub from: String,
    pub nonce: u64,
    pub payload: PayloadJson,
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Clone, Debug)]
pub struct Transaction {
    stx: StacksTransaction,
    inputs: Vec<Entry>,
    outputs: Vec<Entry>,
}

impl Transaction {
    pub fn new(stx: StacksTransaction) -> Self {
        let mut tx = Self {
            stx,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        tx.load_inputs_and_outputs();
        tx
    }

    /// Parse a transaction from broadcast hex
    pub fn from_raw(raw: &str) -> Result<Self, ParseError> {
        Ok(Self::new(codec::decode_hex(raw)?))
    }

    pub fn stx_transaction(&self) -> &StacksTransaction {
        &self.stx
    }

    pub fn signature_count(&self) -> usize {
        self.stx.auth.signature_count()
    }

    pub fn threshold(&self) -> u16 {
        self.stx.auth.threshold()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signature_count() >= self.threshold() as usize
    }

    pub fn verify_signatures(&self) -> Result<(), SigningError> {
        signer::verify(&self.stx)
    }

    /// Public key of every slot, recovered where signed
    pub fn public_keys(&self) -> Result<Vec<StacksPublicKey>, SigningError> {
        signer::recover_slot_keys(&self.stx)
    }

    fn load_inputs_and_outputs(&mut self) {
        let coin = self.stx.network().coin_name().to_string();
        let from = self.stx.sender_address().to_string();
        match &self.stx.payload {
            TransactionPayload::TokenTransfer {
                recipient, amount, ..
            } => {
                self.outputs = vec![Entry {
                    address: recipient.to_string(),
                    value: amount.to_string(),
                    coin: coin.clone(),
                }];
                self.inputs = vec![Entry {
                    address: from,
                    value: amount.to_string(),
                    coin,
                }];
            }
        }
    }
}

impl BaseTransaction for Transaction {
    fn id(&self) -> String {
        self.stx.txid_hex()
    }

    fn tx_type(&self) -> TransactionType {
        TransactionType::Send
    }

    fn signature(&self) -> Vec<String> {
        self.stx
            .auth
            .signatures()
            .iter()
            .map(|s| s.to_hex())
            .collect()
    }

    fn inputs(&self) -> &[Entry] {
        &self.inputs
    }

    fn outputs(&self) -> &[Entry] {
        &self.outputs
    }

    fn to_json(&self) -> TxJson {
        let payload = match &self.stx.payload {
            TransactionPayload::TokenTransfer {
                recipient,
                amount,
                memo,
            } => PayloadJson {
                payload_type: self.stx.payload.payload_type(),
                to: Some(recipient.to_string()),
                amount: Some(amount.to_string()),
                memo: Some(memo.as_text()),
            },
        };
        TxJson {
            id: self.id(),
            fee: self.stx.auth.fee().to_string(),
            from: self.stx.sender_address().to_string(),
            nonce: self.stx.auth.nonce(),
            payload,
        }
    }

    fn to_broadcast_format(&self) -> String {
        codec::encode_hex(&self.stx)
    }
}
