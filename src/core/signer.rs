//! Origin signing
//!
//! Signatures are chained: each one is made over a presign hash derived from
//! the hash left by the previous signature, starting from the txid of the
//! transaction with its spending condition cleared.
//!
//! ```text
//! initial  = txid(cleared tx)
//! presign  = sha512_256(current || auth_type || fee || nonce)
//! postsign = sha512_256(presign || key_encoding || signature)
//! ```
//!
//! Multisig slots are replayed in stored order, so a key's signature goes
//! into its own placeholder and the chain is walked slot by slot. Signatures
//! already present in earlier slots are folded into the chain before the
//! next one is made, which is what lets a partially signed transaction be
//! resumed by another party.

use thiserror::Error;

use super::auth::{
    signer_hash, AuthField, PublicKeyEncoding, SpendingCondition, AUTH_STANDARD,
};
use super::envelope::StacksTransaction;
use crate::crypto::hash::sha512_256;
use crate::crypto::keys::{KeyError, KeyPair, MessageSignature, StacksPublicKey};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Missing private key")]
    MissingPrivateKey,
    #[error("Origin would have too many signatures")]
    TooManySignatures,
    #[error("Key {0} is not a signer of this transaction")]
    UnknownSigner(String),
    #[error("Public key does not match the spending condition signer")]
    SignerMismatch,
    #[error("Already signed by this key")]
    AlreadySigned,
    #[error("Cannot sign slot {0}: a later slot is already signed")]
    SlotOutOfOrder(usize),
    #[error("Insufficient signatures: have {have}, need {need}")]
    InsufficientSignatures { have: usize, need: u16 },
    #[error("Signature {0} does not match any unsigned slot")]
    UnmatchedSignature(String),
    #[error("Signature error: {0}")]
    InvalidSignature(#[from] KeyError),
}

/// Queued input a batch signing run stopped at, as an index into its list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Queued {
    Key(usize),
    Signature(usize),
}

#[derive(Error, Debug)]
#[error("{error}")]
pub struct BatchError {
    pub queued: Queued,
    pub error: SigningError,
}

// =============================================================================
// Signature Hashes
// =============================================================================

/// Hash the first signature is chained from
pub fn initial_sighash(tx: &StacksTransaction) -> [u8; 32] {
    tx.cleared().txid()
}

pub fn presign_sighash(current: &[u8; 32], fee: u64, nonce: u64) -> [u8; 32] {
    let mut data = Vec::with_capacity(32 + 1 + 16);
    data.extend_from_slice(current);
    data.push(AUTH_STANDARD);
    data.extend_from_slice(&fee.to_be_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    sha512_256(&data)
}

pub fn postsign_sighash(
    presign: &[u8; 32],
    encoding: PublicKeyEncoding,
    signature: &MessageSignature,
) -> [u8; 32] {
    let mut data = Vec::with_capacity(32 + 1 + 65);
    data.extend_from_slice(presign);
    data.push(encoding as u8);
    data.extend_from_slice(signature.as_bytes());
    sha512_256(&data)
}

// =============================================================================
// Signer
// =============================================================================

/// A signature computed over the current chain, not yet written to the draft
#[derive(Clone, Debug)]
pub struct PendingSignature {
    pub slot: usize,
    pub presign: [u8; 32],
    pub encoding: PublicKeyEncoding,
    pub signature: MessageSignature,
}

/// Incrementally signs the origin of one transaction
#[derive(Debug)]
pub struct TransactionSigner {
    tx: StacksTransaction,
    sighash: [u8; 32],
    /// First multisig slot not yet folded into `sighash`
    cursor: usize,
}

impl TransactionSigner {
    pub fn new(tx: StacksTransaction) -> Self {
        let sighash = initial_sighash(&tx);
        Self {
            tx,
            sighash,
            cursor: 0,
        }
    }

    pub fn transaction(&self) -> &StacksTransaction {
        &self.tx
    }

    /// Compute `key`'s signature without touching the draft
    pub fn apply(&self, key: &KeyPair) -> Result<PendingSignature, SigningError> {
        let fee = self.tx.auth.fee();
        let nonce = self.tx.auth.nonce();

        match &self.tx.auth {
            SpendingCondition::Singlesig(c) => {
                if !c.signature.is_empty() {
                    return Err(SigningError::TooManySignatures);
                }
                let expected = signer_hash(c.hash_mode, 1, &[key.public_key]);
                if expected.as_ref() != Some(&c.signer) {
                    return Err(SigningError::SignerMismatch);
                }
                let presign = presign_sighash(&self.sighash, fee, nonce);
                Ok(PendingSignature {
                    slot: 0,
                    presign,
                    encoding: c.key_encoding,
                    signature: key.sign(&presign)?,
                })
            }
            SpendingCondition::Multisig(c) => {
                let slot = self.slot_of(&key.public_key)?;
                if self.tx.auth.signature_count() >= c.signatures_required as usize {
                    return Err(SigningError::TooManySignatures);
                }
                if slot < self.cursor {
                    return Err(SigningError::SlotOutOfOrder(slot));
                }
                if c.fields[slot + 1..].iter().any(AuthField::is_signature) {
                    return Err(SigningError::SlotOutOfOrder(slot));
                }

                let current = self.fold_until(slot);
                let presign = presign_sighash(&current, fee, nonce);
                let encoding = match &c.fields[slot] {
                    AuthField::PublicKey(placeholder) => PublicKeyEncoding::for_key(placeholder),
                    AuthField::Signature(encoding, _) => *encoding,
                };
                Ok(PendingSignature {
                    slot,
                    presign,
                    encoding,
                    signature: key.sign(&presign)?,
                })
            }
        }
    }

    /// Place a signature made outside this signer
    ///
    /// The signature is recovered against every slot it could still occupy
    /// and lands in the first one whose key it recovers to.
    pub fn apply_signature(
        &self,
        signature: &MessageSignature,
    ) -> Result<PendingSignature, SigningError> {
        let fee = self.tx.auth.fee();
        let nonce = self.tx.auth.nonce();
        let unmatched = || SigningError::UnmatchedSignature(signature.to_hex());

        match &self.tx.auth {
            SpendingCondition::Singlesig(c) => {
                if !c.signature.is_empty() {
                    return Err(SigningError::TooManySignatures);
                }
                let presign = presign_sighash(&self.sighash, fee, nonce);
                let key = signature.recover(&presign, c.key_encoding.is_compressed())?;
                if signer_hash(c.hash_mode, 1, &[key]).as_ref() != Some(&c.signer) {
                    return Err(unmatched());
                }
                Ok(PendingSignature {
                    slot: 0,
                    presign,
                    encoding: c.key_encoding,
                    signature: *signature,
                })
            }
            SpendingCondition::Multisig(c) => {
                if self.tx.auth.signature_count() >= c.signatures_required as usize {
                    return Err(SigningError::TooManySignatures);
                }
                let first_open = c
                    .fields
                    .iter()
                    .rposition(AuthField::is_signature)
                    .map_or(0, |last| last + 1)
                    .max(self.cursor);

                for slot in first_open..c.fields.len() {
                    let AuthField::PublicKey(placeholder) = &c.fields[slot] else {
                        continue;
                    };
                    let presign = presign_sighash(&self.fold_until(slot), fee, nonce);
                    let recovered = signature.recover(&presign, placeholder.compressed);
                    if recovered.is_ok_and(|key| key.same_point(placeholder)) {
                        return Ok(PendingSignature {
                            slot,
                            presign,
                            encoding: PublicKeyEncoding::for_key(placeholder),
                            signature: *signature,
                        });
                    }
                }
                Err(unmatched())
            }
        }
    }

    /// Write a pending signature into its slot and advance the chain
    pub fn record(&mut self, pending: PendingSignature) {
        self.sighash = postsign_sighash(&pending.presign, pending.encoding, &pending.signature);
        match &mut self.tx.auth {
            SpendingCondition::Singlesig(c) => {
                c.signature = pending.signature;
            }
            SpendingCondition::Multisig(c) => {
                c.fields[pending.slot] = AuthField::Signature(pending.encoding, pending.signature);
                self.cursor = pending.slot + 1;
            }
        }
    }

    /// Sign the origin with one key
    pub fn sign_origin(&mut self, key: &KeyPair) -> Result<(), SigningError> {
        let pending = self.apply(key)?;
        log::debug!(
            "Signed slot {} with key {}",
            pending.slot,
            key.public_key_hex()
        );
        self.record(pending);
        Ok(())
    }

    /// Sign with `keys` and place `signatures`, in slot order
    ///
    /// The order of either list does not matter. An external signature is
    /// placed as soon as it fits ahead of the next key's slot.
    pub fn sign_all(
        &mut self,
        keys: &[KeyPair],
        signatures: &[MessageSignature],
    ) -> Result<(), BatchError> {
        let mut ordered = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let slot = self.slot_of(&key.public_key).map_err(|error| BatchError {
                queued: Queued::Key(index),
                error,
            })?;
            ordered.push((slot, index));
        }
        ordered.sort_by_key(|(slot, _)| *slot);

        let mut waiting: Vec<usize> = (0..signatures.len()).collect();
        let mut ordered = ordered.into_iter().peekable();
        loop {
            let next_slot = ordered.peek().map(|(slot, _)| *slot);
            let placed = waiting.iter().enumerate().find_map(|(position, &index)| {
                self.apply_signature(&signatures[index])
                    .ok()
                    .filter(|pending| next_slot.map_or(true, |next| pending.slot < next))
                    .map(|pending| (position, pending))
            });
            if let Some((position, pending)) = placed {
                log::debug!("Placed external signature in slot {}", pending.slot);
                self.record(pending);
                waiting.remove(position);
                continue;
            }

            match ordered.next() {
                Some((_, index)) => self.sign_origin(&keys[index]).map_err(|error| BatchError {
                    queued: Queued::Key(index),
                    error,
                })?,
                None => break,
            }
        }

        match waiting.first() {
            Some(&index) => Err(BatchError {
                queued: Queued::Signature(index),
                error: SigningError::UnmatchedSignature(signatures[index].to_hex()),
            }),
            None => Ok(()),
        }
    }

    pub fn finish(self) -> StacksTransaction {
        self.tx
    }

    /// Placeholder slot of `key`
    fn slot_of(&self, key: &StacksPublicKey) -> Result<usize, SigningError> {
        let fields = match &self.tx.auth {
            SpendingCondition::Multisig(c) => &c.fields,
            SpendingCondition::Singlesig(_) => return Ok(0),
        };
        if let Some(slot) = fields
            .iter()
            .position(|f| f.public_key().is_some_and(|pk| pk.same_point(key)))
        {
            return Ok(slot);
        }
        let signed = recover_slot_keys(&self.tx)?;
        if signed.iter().any(|pk| pk.same_point(key)) {
            return Err(SigningError::AlreadySigned);
        }
        Err(SigningError::UnknownSigner(key.to_hex()))
    }

    /// Running hash after folding existing signatures in `cursor..slot`
    fn fold_until(&self, slot: usize) -> [u8; 32] {
        let mut current = self.sighash;
        if let SpendingCondition::Multisig(c) = &self.tx.auth {
            for field in &c.fields[self.cursor..slot] {
                if let AuthField::Signature(encoding, signature) = field {
                    let presign = presign_sighash(&current, c.fee, c.nonce);
                    current = postsign_sighash(&presign, *encoding, signature);
                }
            }
        }
        current
    }
}

// =============================================================================
// Recovery and Verification
// =============================================================================

/// Public key of every slot, recovering signed slots from their signatures
///
/// A single-sig transaction yields its one key once signed and nothing
/// before that.
pub fn recover_slot_keys(tx: &StacksTransaction) -> Result<Vec<StacksPublicKey>, SigningError> {
    let mut current = initial_sighash(tx);
    let fee = tx.auth.fee();
    let nonce = tx.auth.nonce();

    match &tx.auth {
        SpendingCondition::Singlesig(c) => {
            if c.signature.is_empty() {
                return Ok(Vec::new());
            }
            let presign = presign_sighash(&current, fee, nonce);
            let key = c
                .signature
                .recover(&presign, c.key_encoding.is_compressed())?;
            Ok(vec![key])
        }
        SpendingCondition::Multisig(c) => {
            let mut keys = Vec::with_capacity(c.fields.len());
            for field in &c.fields {
                match field {
                    AuthField::PublicKey(key) => keys.push(*key),
                    AuthField::Signature(encoding, signature) => {
                        let presign = presign_sighash(&current, fee, nonce);
                        keys.push(signature.recover(&presign, encoding.is_compressed())?);
                        current = postsign_sighash(&presign, *encoding, signature);
                    }
                }
            }
            Ok(keys)
        }
    }
}

/// Check that the origin is fully and correctly signed
///
/// The recovered keys must re-derive the signer hash and the signature count
/// must equal the threshold.
pub fn verify(tx: &StacksTransaction) -> Result<(), SigningError> {
    let have = tx.auth.signature_count();
    let need = tx.auth.threshold();
    if have < need as usize {
        return Err(SigningError::InsufficientSignatures { have, need });
    }
    if have > need as usize {
        return Err(SigningError::TooManySignatures);
    }

    let keys = recover_slot_keys(tx)?;
    match signer_hash(tx.auth.hash_mode(), need, &keys) {
        Some(hash) if &hash == tx.auth.signer() => Ok(()),
        _ => Err(SigningError::SignerMismatch),
    }
}
