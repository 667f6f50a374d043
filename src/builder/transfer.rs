//! Token-transfer builder
//!
//! A fluent builder moving through three states:
//! - `Empty`: nothing set yet; the only state `from()` is accepted in
//! - `Drafting`: fields, public keys and signing keys are accumulating
//! - `Built`: `build()` succeeded; every further call is rejected
//!
//! `sign()` only validates and queues key material. Signatures are made by
//! `build()` over the finished draft, in slot order, so the order in which
//! keys and fields are supplied never changes the result. Signatures made
//! elsewhere are queued with `sign_with_signature()` and placed into the slot
//! of the key they recover to.
//!
//! A queued key or signature that `build()` cannot apply is dropped from the
//! queue, so the builder stays usable after the error.
//!
//! A builder resumed from a transaction that already carries signatures
//! refuses any change to the signed bytes. Supplying the same values again
//! is accepted.

use thiserror::Error;

use crate::core::address::MAX_MULTISIG_KEYS;
use crate::core::auth::{AuthError, AuthField, SpendingCondition};
use crate::core::codec::{self, ParseError};
use crate::core::envelope::{AnchorMode, PostConditionMode, StacksTransaction};
use crate::core::network::Network;
use crate::core::payload::{Memo, PayloadError, PrincipalData, TransactionPayload};
use crate::core::signer::{recover_slot_keys, Queued, SigningError, TransactionSigner};
use crate::core::transaction::{BaseTransaction, Transaction};
use crate::crypto::keys::{KeyError, KeyPair, MessageSignature, StacksPublicKey};

// =============================================================================
// Constants
// =============================================================================

/// Threshold used for multisig senders when `number_signatures` is not called
pub const DEFAULT_THRESHOLD: u16 = 2;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Invalid address")]
    InvalidAddress(#[source] PayloadError),
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Invalid fee")]
    InvalidFee,
    #[error("Memo is too long")]
    MemoTooLong,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Unsupported private key")]
    UnsupportedKey,
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Error parsing the raw transaction")]
    ParseTransaction(#[source] ParseError),
}

impl From<AuthError> for BuilderError {
    fn from(err: AuthError) -> Self {
        Self::InvalidTransaction(err.to_string())
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Defaults applied to every new draft
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuilderConfig {
    pub network: Network,
    pub anchor_mode: AnchorMode,
    pub post_condition_mode: PostConditionMode,
    /// Multisig threshold when none is given
    pub default_threshold: u16,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            network: Network::testnet(),
            anchor_mode: AnchorMode::Any,
            post_condition_mode: PostConditionMode::Deny,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderState {
    Empty,
    Drafting,
    Built,
}

/// Condition loaded by `from()`, with the slot keys recovered from it
#[derive(Clone, Debug)]
struct Resumed {
    auth: SpendingCondition,
    keys: Vec<StacksPublicKey>,
}

impl Resumed {
    fn is_signed(&self) -> bool {
        self.auth.signature_count() > 0
    }

    /// Keys whose slot already carries a signature
    fn signed_keys(&self) -> impl Iterator<Item = &StacksPublicKey> + '_ {
        let signed: Vec<bool> = match &self.auth {
            SpendingCondition::Singlesig(c) => vec![!c.signature.is_empty()],
            SpendingCondition::Multisig(c) => c.fields.iter().map(AuthField::is_signature).collect(),
        };
        self.keys
            .iter()
            .zip(signed)
            .filter_map(|(key, signed)| signed.then_some(key))
    }
}

#[derive(Debug)]
pub struct TransferBuilder {
    config: BuilderConfig,
    state: BuilderState,
    network: Network,
    anchor_mode: AnchorMode,
    post_condition_mode: PostConditionMode,
    fee: Option<u64>,
    nonce: Option<u64>,
    recipient: Option<PrincipalData>,
    amount: Option<u64>,
    memo: Memo,
    public_keys: Vec<StacksPublicKey>,
    threshold: Option<u16>,
    signing_keys: Vec<KeyPair>,
    signatures: Vec<MessageSignature>,
    resumed: Option<Resumed>,
}

impl TransferBuilder {
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            config,
            state: BuilderState::Empty,
            network: config.network,
            anchor_mode: config.anchor_mode,
            post_condition_mode: config.post_condition_mode,
            fee: None,
            nonce: None,
            recipient: None,
            amount: None,
            memo: Memo::default(),
            public_keys: Vec::new(),
            threshold: None,
            signing_keys: Vec::new(),
            signatures: Vec::new(),
            resumed: None,
        }
    }

    /// New builder resumed from broadcast hex
    pub fn from_raw(raw: &str) -> Result<Self, BuilderError> {
        let mut builder = Self::new();
        builder.from(raw)?;
        Ok(builder)
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Public keys of the sender, in slot order
    pub fn public_keys(&self) -> &[StacksPublicKey] {
        &self.public_keys
    }

    // -------------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------------

    /// Fee in micro-STX, as a decimal string
    pub fn fee(&mut self, fee: &str) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        let fee = parse_decimal(fee).ok_or(BuilderError::InvalidFee)?;
        self.guard_signed(self.fee != Some(fee), "fee")?;
        self.fee = Some(fee);
        Ok(self.touch())
    }

    pub fn nonce(&mut self, nonce: u64) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        self.guard_signed(self.nonce != Some(nonce), "nonce")?;
        self.nonce = Some(nonce);
        Ok(self.touch())
    }

    /// Recipient: a Stacks address or `ADDRESS.contract-name`
    pub fn to(&mut self, recipient: &str) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        let recipient: PrincipalData =
            recipient.parse().map_err(BuilderError::InvalidAddress)?;
        self.guard_signed(self.recipient.as_ref() != Some(&recipient), "recipient")?;
        self.recipient = Some(recipient);
        Ok(self.touch())
    }

    /// Amount in micro-STX, as a decimal string
    pub fn amount(&mut self, amount: &str) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        let amount = parse_decimal(amount).ok_or(BuilderError::InvalidAmount)?;
        self.guard_signed(self.amount != Some(amount), "amount")?;
        self.amount = Some(amount);
        Ok(self.touch())
    }

    /// Memo of at most 34 bytes
    pub fn memo(&mut self, memo: &str) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        let memo: Memo = memo.parse().map_err(|_| BuilderError::MemoTooLong)?;
        self.guard_signed(self.memo != memo, "memo")?;
        self.memo = memo;
        Ok(self.touch())
    }

    pub fn network(&mut self, network: Network) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        self.guard_signed(self.network != network, "network")?;
        self.network = network;
        Ok(self.touch())
    }

    /// Single sender public key (hex)
    pub fn from_pub_key(&mut self, public_key: &str) -> Result<&mut Self, BuilderError> {
        self.from_pub_keys([public_key])
    }

    /// Sender public keys (hex), in slot order; replaces any earlier list
    pub fn from_pub_keys<I, S>(&mut self, public_keys: I) -> Result<&mut Self, BuilderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_open()?;
        let mut keys = Vec::new();
        for text in public_keys {
            let text = text.as_ref();
            let key = StacksPublicKey::from_hex(text.trim())
                .map_err(|_| BuilderError::InvalidPublicKey(text.to_string()))?;
            if keys.iter().any(|k: &StacksPublicKey| k.same_point(&key)) {
                return Err(BuilderError::InvalidTransaction(format!(
                    "duplicate public key {}",
                    text
                )));
            }
            keys.push(key);
        }
        if keys.len() > MAX_MULTISIG_KEYS {
            return Err(AuthError::TooManyKeys(keys.len()).into());
        }
        self.guard_signed(self.public_keys != keys, "public keys")?;
        self.public_keys = keys;
        Ok(self.touch())
    }

    /// Signatures required for a multisig sender
    pub fn number_signatures(&mut self, threshold: u16) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        if threshold == 0 {
            return Err(AuthError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            )
            .into());
        }
        let current = self.threshold.unwrap_or(self.config.default_threshold);
        self.guard_signed(current != threshold, "threshold")?;
        self.threshold = Some(threshold);
        Ok(self.touch())
    }

    /// Resume from a serialized transaction; only valid on a fresh builder
    pub fn from(&mut self, raw: &str) -> Result<&mut Self, BuilderError> {
        if self.state != BuilderState::Empty {
            return Err(BuilderError::InvalidTransaction(
                "from() is only accepted on an empty builder".to_string(),
            ));
        }
        let tx = codec::decode_hex(raw).map_err(|e| {
            log::warn!("Rejected raw transaction: {}", e);
            BuilderError::ParseTransaction(e)
        })?;
        let keys = recover_slot_keys(&tx).map_err(|e| {
            BuilderError::ParseTransaction(ParseError::InvalidField {
                field: "signature",
                reason: e.to_string(),
            })
        })?;

        self.network = Network {
            version: tx.version,
            chain_id: tx.chain_id,
        };
        self.anchor_mode = tx.anchor_mode;
        self.post_condition_mode = tx.post_condition_mode;
        self.fee = Some(tx.auth.fee());
        self.nonce = Some(tx.auth.nonce());
        match tx.payload {
            TransactionPayload::TokenTransfer {
                recipient,
                amount,
                memo,
            } => {
                self.recipient = Some(recipient);
                self.amount = Some(amount);
                self.memo = memo;
            }
        }
        if tx.auth.is_multisig() {
            self.threshold = Some(tx.auth.threshold());
        }
        self.public_keys = keys.clone();

        log::debug!(
            "Resumed transaction with {} of {} signatures",
            tx.auth.signature_count(),
            tx.auth.threshold()
        );
        self.resumed = Some(Resumed {
            auth: tx.auth,
            keys,
        });
        Ok(self.touch())
    }

    /// Queue a private key (hex or BIP32 extended) for signing at `build()`
    pub fn sign(&mut self, key: &str) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        let key_pair = KeyPair::parse(key).map_err(|e| match e {
            KeyError::MissingPrivateKey => BuilderError::Signing(SigningError::MissingPrivateKey),
            _ => BuilderError::UnsupportedKey,
        })?;
        let public_key = &key_pair.public_key;
        if self.signing_keys.iter().any(|k| k.public_key.same_point(public_key))
            || self
                .resumed
                .as_ref()
                .is_some_and(|r| r.signed_keys().any(|k| k.same_point(public_key)))
        {
            return Err(SigningError::AlreadySigned.into());
        }
        if !self.public_keys.is_empty()
            && !self.public_keys.iter().any(|k| k.same_point(public_key))
        {
            return Err(SigningError::UnknownSigner(key_pair.public_key_hex()).into());
        }
        log::debug!("Queued signing key {}", key_pair.public_key_hex());
        self.signing_keys.push(key_pair);
        Ok(self.touch())
    }

    /// Queue a signature (65 bytes of hex) made outside this builder
    ///
    /// It is placed at `build()` into the slot whose key it recovers to.
    pub fn sign_with_signature(&mut self, signature: &str) -> Result<&mut Self, BuilderError> {
        self.ensure_open()?;
        let signature = MessageSignature::from_hex(signature).map_err(SigningError::from)?;
        if self.signatures.contains(&signature) {
            return Err(SigningError::AlreadySigned.into());
        }
        log::debug!("Queued external signature {}", signature.to_hex());
        self.signatures.push(signature);
        Ok(self.touch())
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Assemble the draft, apply queued signatures and freeze the result
    ///
    /// The threshold does not have to be met: a partially signed transaction
    /// is a valid result.
    pub fn build(&mut self) -> Result<Transaction, BuilderError> {
        self.ensure_open()?;

        let fee = self.fee.ok_or_else(|| missing("fee"))?;
        let nonce = self.nonce.ok_or_else(|| missing("nonce"))?;
        let recipient = self.recipient.clone().ok_or_else(|| missing("recipient"))?;
        let amount = self.amount.ok_or_else(|| missing("amount"))?;

        let mut auth = self.spending_condition()?;
        auth.set_fee(fee);
        auth.set_nonce(nonce);

        let draft = StacksTransaction {
            version: self.network.version,
            chain_id: self.network.chain_id,
            auth,
            anchor_mode: self.anchor_mode,
            post_condition_mode: self.post_condition_mode,
            payload: TransactionPayload::TokenTransfer {
                recipient,
                amount,
                memo: self.memo.clone(),
            },
        };

        let mut signer = TransactionSigner::new(draft);
        if let Err(failure) = signer.sign_all(&self.signing_keys, &self.signatures) {
            match failure.queued {
                Queued::Key(index) => {
                    let key = self.signing_keys.remove(index);
                    log::warn!("Dropped signing key {}: {}", key.public_key_hex(), failure.error);
                }
                Queued::Signature(index) => {
                    let signature = self.signatures.remove(index);
                    log::warn!("Dropped signature {}: {}", signature.to_hex(), failure.error);
                }
            }
            return Err(failure.error.into());
        }
        let tx = Transaction::new(signer.finish());

        self.state = BuilderState::Built;
        log::info!(
            "Built transfer {} ({} of {} signatures)",
            tx.id(),
            tx.signature_count(),
            tx.threshold()
        );
        Ok(tx)
    }

    fn spending_condition(&self) -> Result<SpendingCondition, BuilderError> {
        if let Some(resumed) = &self.resumed {
            let threshold_kept = !resumed.auth.is_multisig()
                || self.threshold == Some(resumed.auth.threshold());
            if resumed.keys == self.public_keys && threshold_kept {
                return Ok(resumed.auth.clone());
            }
        }

        let keys = match (self.public_keys.as_slice(), self.signing_keys.as_slice()) {
            ([], [only]) => vec![only.public_key],
            ([], _) => return Err(missing("sender public key")),
            (keys, _) => keys.to_vec(),
        };

        if let [key] = keys.as_slice() {
            if self.threshold.is_some_and(|t| t > 1) {
                return Err(AuthError::InvalidThreshold(
                    "a single key cannot require more than one signature".to_string(),
                )
                .into());
            }
            return Ok(SpendingCondition::new_singlesig(key));
        }

        let threshold = self.threshold.unwrap_or(self.config.default_threshold);
        Ok(SpendingCondition::new_multisig(threshold, &keys)?)
    }

    // -------------------------------------------------------------------------
    // State guards
    // -------------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), BuilderError> {
        if self.state == BuilderState::Built {
            return Err(BuilderError::InvalidTransaction(
                "transaction has already been built".to_string(),
            ));
        }
        Ok(())
    }

    fn guard_signed(&self, changed: bool, what: &str) -> Result<(), BuilderError> {
        let signed = self.resumed.as_ref().is_some_and(Resumed::is_signed);
        if signed && changed {
            log::warn!("Rejected change of {} on a signed transaction", what);
            return Err(BuilderError::InvalidTransaction(format!(
                "cannot change the {} of a signed transaction",
                what
            )));
        }
        Ok(())
    }

    fn touch(&mut self) -> &mut Self {
        self.state = BuilderState::Drafting;
        self
    }
}

impl Default for TransferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> BuilderError {
    BuilderError::InvalidTransaction(format!("{} is required", field))
}

/// Unsigned decimal that fits in a u64
fn parse_decimal(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPIENT: &str = "STDE7Y8HV3RX8VBM2TZVWJTS7ZA1XB0SSC3NEVH0";
    const PRV: [&str; 3] = [
        "21d43d2ae0da1d9d04cfcaac7d397a33733881081f0b2cd038062cf0ccbb752601",
        "c71700b07d520a8c9731e4d0f095aa6efb91e16e25fb27ce2b72e7b698f8127a01",
        "e75dcb66f84287eaf347955e94fa04337298dbd95aa0dbb985771104ef1913db01",
    ];
    const PUB: [&str; 3] = [
        "02b087ca52f40fdfdf4b16a0bbf7e91e4db2e183ac5c6491a5f60a5450e25de7d0",
        "024abddd63b56c55cd1ed0803c26c473f5f0b9d8473b37b65bd812f035365f154b",
        "038e3c4529395611be9abf6fa3b6987e81d402385e3d605a073f42f407565a4a3d",
    ];

    const FULLY_SIGNED: &str = "808000000004012fe507c09dbb23c3b7e5d166c81fc4b87692510b000000000000000100000000000000b4000000030201091538373641a50a4ebd6f653bb7b477489aceec50eff963072a838d2eaf50e4784c7c6d1490f57b899f0f04c215fce9176d9bb4ce19bfb07499c48878675a1f02008074202e04a7c777b4cdd26ad3fd35194311536113666d81a3840148e59eb43f274d88768ef1202d55633bfdcde8c6057932107354f406af6c378b6ea6b75d1a00038e3c4529395611be9abf6fa3b6987e81d402385e3d605a073f42f407565a4a3d000203020000000000051a1ae3f911d8f1d46d7416bfbe4b593fd41eac19cb00000000000003e874657374000000000000000000000000000000000000000000000000000000000000";
    const MID_KEY_UNSIGNED: &str = "808000000004012fe507c09dbb23c3b7e5d166c81fc4b87692510b000000000000000000000000000000b40000000302009473a37b914f703c81f33141d10eabe4550c4d61f113662cc11cdc0463fc377358408c73d3d3273cdbcc3511dbbd2031b5eaca4cb2b13925da9f9b0c7e64d1a600024abddd63b56c55cd1ed0803c26c473f5f0b9d8473b37b65bd812f035365f154b02016aac0347b8520d8905cbd13c601f45a0ccbbb24831320c54d9ee2c1e3656b76d75e1c527932267d80beb90257bbe2dc7184d9b168993ab3a40fa73be6973c5f5000203020000000000051a1ae3f911d8f1d46d7416bfbe4b593fd41eac19cb00000000000003e874657374000000000000000000000000000000000000000000000000000000000000";
    const FIRST_KEY_UNSIGNED: &str = "808000000004012fe507c09dbb23c3b7e5d166c81fc4b87692510b000000000000000000000000000000b4000000030002b087ca52f40fdfdf4b16a0bbf7e91e4db2e183ac5c6491a5f60a5450e25de7d002000436f906d040388e3123eb9c37614d7f39da2f283385cda40997212acfa5b24d032fac8299ae9590fbd24d6398ac1c489b523c418d8c06b35467e685199877860201dba16d040f0af2fa8d4bf388cbc7f0cd7463aa7058c49f7e5db2d72d868d7167528cd8393369b94480f9b7f8a2c9087cbd57d4d1a782e553f9cede66642d12c9000203020000000000051a1ae3f911d8f1d46d7416bfbe4b593fd41eac19cb00000000000003e874657374000000000000000000000000000000000000000000000000000000000000";
    const SINGLE_SIGNED: &str = "8080000000040043596b5386f466863e25658ddf94bd0fadab0048000000000000000000000000000000b400010285a6abc3ffa4ea677cc58e00699334240243a02b2a016c841217c634dde3b13074cb92ac61ac0de6a650f9530a9928844862305cdd3916babc6732656f627f03020000000000051a1ae3f911d8f1d46d7416bfbe4b593fd41eac19cb00000000000003e874657374000000000000000000000000000000000000000000000000000000000000";

    fn transfer(nonce: u64) -> TransferBuilder {
        let mut builder = TransferBuilder::new();
        builder
            .fee("180")
            .unwrap()
            .nonce(nonce)
            .unwrap()
            .to(RECIPIENT)
            .unwrap()
            .amount("1000")
            .unwrap()
            .memo("test")
            .unwrap();
        builder
    }

    #[test]
    fn test_half_signed_then_completed() {
        let mut first = transfer(1);
        first.sign(PRV[0]).unwrap();
        first.from_pub_keys(PUB).unwrap();
        first.number_signatures(2).unwrap();
        let half = first.build().unwrap();
        assert_eq!(half.signature().len(), 1);
        assert!(!half.is_fully_signed());

        let mut second = TransferBuilder::from_raw(&half.to_broadcast_format()).unwrap();
        second.sign(PRV[1]).unwrap();
        second.from_pub_keys(PUB).unwrap();
        let signed = second.build().unwrap();
        assert_eq!(signed.to_broadcast_format(), FULLY_SIGNED);
        assert_eq!(signed.signature().len(), 2);
        assert!(signed.verify_signatures().is_ok());
    }

    #[test]
    fn test_unsigned_then_signed_by_both() {
        let mut first = transfer(1);
        first.from_pub_keys(PUB).unwrap().number_signatures(2).unwrap();
        let unsigned = first.build().unwrap();
        assert!(unsigned.signature().is_empty());

        let mut second = TransferBuilder::from_raw(&unsigned.to_broadcast_format()).unwrap();
        second.sign(PRV[0]).unwrap().sign(PRV[1]).unwrap();
        let signed = second.build().unwrap();
        assert_eq!(signed.to_broadcast_format(), FULLY_SIGNED);

        // Rebuilding a signed transaction reproduces it exactly
        let remake = TransferBuilder::from_raw(FULLY_SIGNED).unwrap().build().unwrap();
        assert_eq!(remake.to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_signing_order_does_not_matter() {
        let mut builder = transfer(1);
        builder
            .sign(PRV[1])
            .unwrap()
            .sign(PRV[0])
            .unwrap()
            .from_pub_keys(PUB)
            .unwrap();
        assert_eq!(builder.build().unwrap().to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_mid_key_no_signer() {
        let mut first = transfer(0);
        first.sign(PRV[0]).unwrap().from_pub_keys(PUB).unwrap();
        let half = first.build().unwrap();

        let mut second = TransferBuilder::from_raw(&half.to_broadcast_format()).unwrap();
        second.sign(PRV[2]).unwrap();
        let signed = second.build().unwrap();
        assert_eq!(signed.to_broadcast_format(), MID_KEY_UNSIGNED);

        let json = signed.to_json();
        assert_eq!(json.fee, "180");
        assert_eq!(json.payload.to.as_deref(), Some(RECIPIENT));
        assert_eq!(json.payload.memo.as_deref(), Some("test"));
        assert_eq!(json.payload.amount.as_deref(), Some("1000"));
    }

    #[test]
    fn test_first_key_no_signer() {
        let mut first = transfer(0);
        first.sign(PRV[1]).unwrap().from_pub_keys(PUB).unwrap();
        let half = first.build().unwrap();

        let mut second = TransferBuilder::from_raw(&half.to_broadcast_format()).unwrap();
        second.sign(PRV[2]).unwrap();
        let signed = second.build().unwrap();
        assert_eq!(signed.to_broadcast_format(), FIRST_KEY_UNSIGNED);
        assert_eq!(signed.signature().len(), 2);
    }

    #[test]
    fn test_resume_recovers_public_keys() {
        let builder = TransferBuilder::from_raw(FIRST_KEY_UNSIGNED).unwrap();
        let keys: Vec<String> = builder.public_keys().iter().map(|k| k.to_hex()).collect();
        assert_eq!(keys, PUB);
    }

    #[test]
    fn test_single_sig_transfer() {
        let mut builder = transfer(0);
        builder.from_pub_key(PUB[0]).unwrap().sign(PRV[0]).unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(tx.to_broadcast_format(), SINGLE_SIGNED);
        assert_eq!(tx.signature().len(), 1);
        assert!(tx.verify_signatures().is_ok());

        let json = tx.to_json();
        assert_eq!(json.nonce, 0);
        assert_eq!(json.from, tx.inputs()[0].address);
        assert!(json.from.starts_with("ST"));
    }

    #[test]
    fn test_single_sig_key_derived_from_signer() {
        let mut builder = transfer(0);
        builder.sign(PRV[0]).unwrap();
        assert_eq!(builder.build().unwrap().to_broadcast_format(), SINGLE_SIGNED);
    }

    #[test]
    fn test_single_sig_unsigned_then_signed() {
        let mut first = transfer(0);
        first.from_pub_key(PUB[0]).unwrap();
        let unsigned = first.build().unwrap();

        let mut second = TransferBuilder::from_raw(&unsigned.to_broadcast_format()).unwrap();
        second.sign(PRV[0]).unwrap();
        assert_eq!(second.build().unwrap().to_broadcast_format(), SINGLE_SIGNED);
    }

    #[test]
    fn test_extended_private_key_signs() {
        let mut first = transfer(1);
        first.sign(PRV[0]).unwrap().from_pub_keys(PUB).unwrap();
        let half = first.build().unwrap();

        // Same secret as PRV[1], as a BIP32 master key with zeroed chain code
        let kp = KeyPair::from_private_key_hex(PRV[1]).unwrap();
        let mut payload = Vec::with_capacity(78);
        payload.extend_from_slice(&[0x04, 0x88, 0xad, 0xe4]);
        payload.extend_from_slice(&[0u8; 9]);
        payload.extend_from_slice(&[0u8; 32]);
        payload.push(0);
        payload.extend_from_slice(&kp.secret_key.secret_bytes());
        let xprv = bs58::encode(payload).with_check().into_string();

        let mut second = TransferBuilder::from_raw(&half.to_broadcast_format()).unwrap();
        second.from_pub_keys(PUB).unwrap().sign(&xprv).unwrap();
        assert_eq!(second.build().unwrap().to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_amount_zero_is_valid() {
        let mut builder = transfer(0);
        builder.amount("0").unwrap().from_pub_key(PUB[0]).unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(tx.to_json().payload.amount.as_deref(), Some("0"));
    }

    #[test]
    fn test_validation_messages() {
        let mut builder = TransferBuilder::new();
        assert_eq!(
            builder.sign("invalidKey").unwrap_err().to_string(),
            "Unsupported private key"
        );
        assert_eq!(
            builder.to("invalidaddress").unwrap_err().to_string(),
            "Invalid address"
        );
        assert_eq!(
            builder.amount("invalidamount").unwrap_err().to_string(),
            "Invalid amount"
        );
        assert_eq!(builder.amount("-5").unwrap_err().to_string(), "Invalid amount");
        assert_eq!(builder.amount("").unwrap_err().to_string(), "Invalid amount");
        assert_eq!(
            builder
                .amount("18446744073709551616")
                .unwrap_err()
                .to_string(),
            "Invalid amount"
        );
        assert_eq!(builder.fee("1.5").unwrap_err().to_string(), "Invalid fee");
        assert_eq!(
            builder
                .memo("This is a memo that is too long for a transaction")
                .unwrap_err()
                .to_string(),
            "Memo is too long"
        );
        assert!(builder.memo(&"m".repeat(34)).is_ok());
        assert!(builder.memo(&"m".repeat(35)).is_err());
        assert_eq!(
            builder.sign(PUB[0]).unwrap_err().to_string(),
            "Missing private key"
        );
        assert!(matches!(
            builder.from_pub_key("02abcd"),
            Err(BuilderError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_failed_setter_leaves_value() {
        let mut builder = transfer(0);
        assert!(builder.amount("-5").is_err());
        builder.from_pub_key(PUB[0]).unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(tx.to_json().payload.amount.as_deref(), Some("1000"));
    }

    #[test]
    fn test_duplicate_signing_key() {
        let mut builder = transfer(0);
        builder.sign(PRV[0]).unwrap();
        assert!(matches!(
            builder.sign(PRV[0]),
            Err(BuilderError::Signing(SigningError::AlreadySigned))
        ));
    }

    #[test]
    fn test_build_requires_fields() {
        let mut builder = TransferBuilder::new();
        builder.fee("180").unwrap().from_pub_key(PUB[0]).unwrap();
        assert!(matches!(
            builder.build(),
            Err(BuilderError::InvalidTransaction(_))
        ));

        let mut no_keys = transfer(0);
        assert!(matches!(
            no_keys.build(),
            Err(BuilderError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_threshold_checked_at_build() {
        let mut builder = transfer(0);
        builder
            .from_pub_keys(PUB)
            .unwrap()
            .number_signatures(4)
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(builder.number_signatures(0).is_err());
    }

    #[test]
    fn test_oversigning_fails() {
        let mut builder = transfer(1);
        builder.from_pub_keys(PUB).unwrap().number_signatures(2).unwrap();
        for key in PRV {
            builder.sign(key).unwrap();
        }
        let err = builder.build().unwrap_err();
        assert_eq!(err.to_string(), "Origin would have too many signatures");
        assert_eq!(builder.state(), BuilderState::Drafting);

        // The extra key is dropped; the rest still build
        let tx = builder.build().unwrap();
        assert_eq!(tx.to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_signer_not_in_key_list() {
        let mut builder = transfer(1);
        builder.from_pub_keys(PUB).unwrap();
        assert!(matches!(
            builder.sign(&KeyPair::generate().private_key_hex()),
            Err(BuilderError::Signing(SigningError::UnknownSigner(_)))
        ));
        builder.sign(PRV[0]).unwrap().sign(PRV[1]).unwrap();
        assert_eq!(builder.build().unwrap().to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_foreign_key_dropped_after_failed_build() {
        let mut builder = transfer(1);
        builder.sign(&KeyPair::generate().private_key_hex()).unwrap();
        builder.from_pub_keys(PUB).unwrap();
        assert!(matches!(
            builder.build(),
            Err(BuilderError::Signing(SigningError::UnknownSigner(_)))
        ));
        assert_eq!(builder.state(), BuilderState::Drafting);

        builder.sign(PRV[0]).unwrap().sign(PRV[1]).unwrap();
        assert_eq!(builder.build().unwrap().to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_resumed_signer_cannot_sign_again() {
        let mut builder = TransferBuilder::from_raw(MID_KEY_UNSIGNED).unwrap();
        assert!(matches!(
            builder.sign(PRV[0]),
            Err(BuilderError::Signing(SigningError::AlreadySigned))
        ));
    }

    /// Signature `key` would add to `tx`, computed outside any builder
    fn signature_for(tx: &Transaction, key: &str) -> String {
        let key = KeyPair::from_private_key_hex(key).unwrap();
        TransactionSigner::new(tx.stx_transaction().clone())
            .apply(&key)
            .unwrap()
            .signature
            .to_hex()
    }

    #[test]
    fn test_external_signatures() {
        let mut first = transfer(1);
        first.from_pub_keys(PUB).unwrap();
        let unsigned = first.build().unwrap();
        let raw = unsigned.to_broadcast_format();

        let mut second = TransferBuilder::from_raw(&raw).unwrap();
        second.sign_with_signature(&signature_for(&unsigned, PRV[0])).unwrap();
        let half = second.build().unwrap();
        let second_signature = signature_for(&half, PRV[1]);

        // Queue order does not matter
        let mut third = TransferBuilder::from_raw(&raw).unwrap();
        third
            .sign_with_signature(&second_signature)
            .unwrap()
            .sign_with_signature(&signature_for(&unsigned, PRV[0]))
            .unwrap();
        let signed = third.build().unwrap();
        assert_eq!(signed.to_broadcast_format(), FULLY_SIGNED);
        assert!(signed.verify_signatures().is_ok());

        // Mixed with a private key
        let mut fourth = TransferBuilder::from_raw(&raw).unwrap();
        fourth
            .sign(PRV[1])
            .unwrap()
            .sign_with_signature(&signature_for(&unsigned, PRV[0]))
            .unwrap();
        assert_eq!(fourth.build().unwrap().to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_unmatched_external_signature() {
        let mut other = transfer(7);
        other.from_pub_keys(PUB).unwrap();
        let foreign = signature_for(&other.build().unwrap(), PRV[0]);

        let mut builder = transfer(1);
        builder.from_pub_keys(PUB).unwrap();
        builder.sign_with_signature(&foreign).unwrap();
        assert!(matches!(
            builder.sign_with_signature(&foreign),
            Err(BuilderError::Signing(SigningError::AlreadySigned))
        ));
        assert!(matches!(
            builder.build(),
            Err(BuilderError::Signing(SigningError::UnmatchedSignature(_)))
        ));

        builder.sign(PRV[0]).unwrap().sign(PRV[1]).unwrap();
        assert_eq!(builder.build().unwrap().to_broadcast_format(), FULLY_SIGNED);
    }

    #[test]
    fn test_malformed_external_signature() {
        let mut builder = transfer(1);
        assert!(matches!(
            builder.sign_with_signature("abcd"),
            Err(BuilderError::Signing(SigningError::InvalidSignature(_)))
        ));
    }

    #[test]
    fn test_signed_transaction_is_frozen() {
        let mut builder = TransferBuilder::from_raw(MID_KEY_UNSIGNED).unwrap();
        assert!(matches!(
            builder.fee("181"),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(matches!(
            builder.memo("other"),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(matches!(
            builder.from_pub_keys(&PUB[..2]),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(matches!(
            builder.network(Network::mainnet()),
            Err(BuilderError::InvalidTransaction(_))
        ));
        // Same values are accepted
        builder
            .fee("180")
            .unwrap()
            .nonce(0)
            .unwrap()
            .memo("test")
            .unwrap()
            .from_pub_keys(PUB)
            .unwrap()
            .number_signatures(2)
            .unwrap();
        assert_eq!(
            builder.build().unwrap().to_broadcast_format(),
            MID_KEY_UNSIGNED
        );
    }

    #[test]
    fn test_unsigned_resume_can_be_edited() {
        let mut first = transfer(1);
        first.from_pub_keys(PUB).unwrap();
        let unsigned = first.build().unwrap();

        let mut second = TransferBuilder::from_raw(&unsigned.to_broadcast_format()).unwrap();
        second.fee("200").unwrap();
        let tx = second.build().unwrap();
        assert_eq!(tx.to_json().fee, "200");
    }

    #[test]
    fn test_built_builder_rejects_everything() {
        let mut builder = transfer(0);
        builder.from_pub_key(PUB[0]).unwrap();
        builder.build().unwrap();
        assert_eq!(builder.state(), BuilderState::Built);

        assert!(matches!(
            builder.fee("1"),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(matches!(
            builder.sign(PRV[0]),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(matches!(
            builder.from(FULLY_SIGNED),
            Err(BuilderError::InvalidTransaction(_))
        ));
        assert!(matches!(
            builder.build(),
            Err(BuilderError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_from_only_on_empty_builder() {
        let mut builder = TransferBuilder::new();
        builder.fee("1").unwrap();
        assert!(matches!(
            builder.from(FULLY_SIGNED),
            Err(BuilderError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_parse_failure_message() {
        let err = TransferBuilder::from_raw("0xdeadbeef").unwrap_err();
        assert!(matches!(err, BuilderError::ParseTransaction(_)));
        assert_eq!(err.to_string(), "Error parsing the raw transaction");
    }

    #[test]
    fn test_mainnet_network() {
        let mut builder = TransferBuilder::new();
        builder
            .network(Network::mainnet())
            .unwrap()
            .fee("180")
            .unwrap()
            .nonce(0)
            .unwrap()
            .to("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7")
            .unwrap()
            .amount("5")
            .unwrap()
            .from_pub_keys(PUB)
            .unwrap();
        let tx = builder.build().unwrap();
        let raw = tx.to_broadcast_format();
        assert!(raw.starts_with("0000000001"));
        assert!(tx.to_json().from.starts_with("SM"));
        assert_eq!(tx.outputs()[0].coin, "stx");
    }
}
