//! Canonical wire codec
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! version u8 | chain_id u32 | auth_type u8
//! hash_mode u8 | signer [20] | nonce u64 | fee u64
//!   single-sig: key_encoding u8 | signature [65]
//!   multisig:   field_count u32 | (tag u8 | body)* | signatures_required u16
//! anchor_mode u8 | post_condition_mode u8 | post_condition_count u32
//! payload_type u8 | principal | amount u64 | memo [34]
//! ```
//!
//! Public-key fields always carry the 33-byte compressed point; the field tag
//! records which encoding the key is committed to.

use bytes::{Buf, BufMut, BytesMut};
use secp256k1::PublicKey;
use thiserror::Error;

use super::address::{StacksAddress, MAX_MULTISIG_KEYS};
use super::auth::{
    AuthField, HashMode, MultiSigSpendingCondition, PublicKeyEncoding,
    SingleSigSpendingCondition, SpendingCondition, AUTH_STANDARD, FIELD_PUBLIC_KEY_COMPRESSED,
    FIELD_PUBLIC_KEY_UNCOMPRESSED, FIELD_SIGNATURE_COMPRESSED, FIELD_SIGNATURE_UNCOMPRESSED,
};
use super::envelope::{AnchorMode, PostConditionMode, StacksTransaction};
use super::network::TransactionVersion;
use super::payload::{
    validate_contract_name, Memo, PrincipalData, TransactionPayload, MEMO_LENGTH,
    PAYLOAD_TOKEN_TRANSFER, PRINCIPAL_CONTRACT, PRINCIPAL_STANDARD,
};
use crate::crypto::keys::{MessageSignature, StacksPublicKey, SIGNATURE_LENGTH};

/// Size of a public key on the wire
const PUBLIC_KEY_WIRE_LENGTH: usize = 33;

/// Smallest encoded auth field (tag + compressed key)
const MIN_FIELD_LENGTH: usize = 1 + PUBLIC_KEY_WIRE_LENGTH;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid hex encoding")]
    InvalidHex,
    #[error("Unexpected end of input reading {field}: need {needed} bytes, {remaining} left")]
    UnexpectedEnd {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("Unknown {field} tag: 0x{tag:02x}")]
    UnknownTag { field: &'static str, tag: u8 },
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

// =============================================================================
// Encoding
// =============================================================================

/// Serialize a transaction to its canonical bytes
pub fn encode(tx: &StacksTransaction) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(256);

    buf.put_u8(tx.version as u8);
    buf.put_u32(tx.chain_id);
    buf.put_u8(AUTH_STANDARD);
    encode_spending_condition(&tx.auth, &mut buf);

    buf.put_u8(tx.anchor_mode as u8);
    buf.put_u8(tx.post_condition_mode as u8);
    buf.put_u32(0);

    encode_payload(&tx.payload, &mut buf);
    buf.to_vec()
}

/// Serialize a transaction as lowercase hex
pub fn encode_hex(tx: &StacksTransaction) -> String {
    hex::encode(encode(tx))
}

fn encode_spending_condition(condition: &SpendingCondition, buf: &mut BytesMut) {
    match condition {
        SpendingCondition::Singlesig(c) => {
            buf.put_u8(c.hash_mode as u8);
            buf.put_slice(&c.signer);
            buf.put_u64(c.nonce);
            buf.put_u64(c.fee);
            buf.put_u8(c.key_encoding as u8);
            buf.put_slice(c.signature.as_bytes());
        }
        SpendingCondition::Multisig(c) => {
            buf.put_u8(c.hash_mode as u8);
            buf.put_slice(&c.signer);
            buf.put_u64(c.nonce);
            buf.put_u64(c.fee);
            buf.put_u32(c.fields.len() as u32);
            for field in &c.fields {
                encode_auth_field(field, buf);
            }
            buf.put_u16(c.signatures_required);
        }
    }
}

fn encode_auth_field(field: &AuthField, buf: &mut BytesMut) {
    buf.put_u8(field.tag());
    match field {
        AuthField::PublicKey(key) => buf.put_slice(&key.key.serialize()),
        AuthField::Signature(_, signature) => buf.put_slice(signature.as_bytes()),
    }
}

fn encode_payload(payload: &TransactionPayload, buf: &mut BytesMut) {
    buf.put_u8(payload.payload_type());
    match payload {
        TransactionPayload::TokenTransfer {
            recipient,
            amount,
            memo,
        } => {
            encode_principal(recipient, buf);
            buf.put_u64(*amount);
            buf.put_slice(&memo.to_wire());
        }
    }
}

fn encode_principal(principal: &PrincipalData, buf: &mut BytesMut) {
    match principal {
        PrincipalData::Standard(address) => {
            buf.put_u8(PRINCIPAL_STANDARD);
            buf.put_u8(address.version());
            buf.put_slice(address.hash160());
        }
        PrincipalData::Contract(address, name) => {
            buf.put_u8(PRINCIPAL_CONTRACT);
            buf.put_u8(address.version());
            buf.put_slice(address.hash160());
            buf.put_u8(name.len() as u8);
            buf.put_slice(name.as_bytes());
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Parse canonical bytes; the whole input must be consumed
pub fn decode(bytes: &[u8]) -> Result<StacksTransaction, ParseError> {
    let mut buf = bytes;

    need(&buf, 1, "version")?;
    let version_byte = buf.get_u8();
    let version = TransactionVersion::from_u8(version_byte).ok_or(ParseError::UnknownTag {
        field: "version",
        tag: version_byte,
    })?;

    need(&buf, 4, "chain id")?;
    let chain_id = buf.get_u32();

    need(&buf, 1, "auth type")?;
    let auth_type = buf.get_u8();
    if auth_type != AUTH_STANDARD {
        return Err(ParseError::UnknownTag {
            field: "auth type",
            tag: auth_type,
        });
    }
    let auth = decode_spending_condition(&mut buf)?;

    need(&buf, 1, "anchor mode")?;
    let anchor_byte = buf.get_u8();
    let anchor_mode = AnchorMode::from_u8(anchor_byte).ok_or(ParseError::UnknownTag {
        field: "anchor mode",
        tag: anchor_byte,
    })?;

    need(&buf, 1, "post-condition mode")?;
    let mode_byte = buf.get_u8();
    let post_condition_mode =
        PostConditionMode::from_u8(mode_byte).ok_or(ParseError::UnknownTag {
            field: "post-condition mode",
            tag: mode_byte,
        })?;

    need(&buf, 4, "post-condition count")?;
    let post_conditions = buf.get_u32();
    if post_conditions != 0 {
        return Err(ParseError::InvalidField {
            field: "post-conditions",
            reason: format!("{} post-conditions present, only the empty list is supported", post_conditions),
        });
    }

    let payload = decode_payload(&mut buf)?;

    if buf.has_remaining() {
        return Err(ParseError::TrailingBytes(buf.remaining()));
    }

    Ok(StacksTransaction {
        version,
        chain_id,
        auth,
        anchor_mode,
        post_condition_mode,
        payload,
    })
}

/// Parse hex text, with or without a `0x` prefix
pub fn decode_hex(raw: &str) -> Result<StacksTransaction, ParseError> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let bytes = hex::decode(raw).map_err(|_| ParseError::InvalidHex)?;
    decode(&bytes)
}

fn need(buf: &&[u8], needed: usize, field: &'static str) -> Result<(), ParseError> {
    if buf.remaining() < needed {
        return Err(ParseError::UnexpectedEnd {
            field,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn take<const N: usize>(buf: &mut &[u8], field: &'static str) -> Result<[u8; N], ParseError> {
    need(buf, N, field)?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn decode_spending_condition(buf: &mut &[u8]) -> Result<SpendingCondition, ParseError> {
    need(buf, 1, "hash mode")?;
    let mode_byte = buf.get_u8();
    let hash_mode = HashMode::from_u8(mode_byte).ok_or(ParseError::UnknownTag {
        field: "hash mode",
        tag: mode_byte,
    })?;
    let signer = take::<20>(buf, "signer")?;

    need(buf, 16, "nonce and fee")?;
    let nonce = buf.get_u64();
    let fee = buf.get_u64();

    if !hash_mode.is_multisig() {
        need(buf, 1, "key encoding")?;
        let encoding_byte = buf.get_u8();
        let key_encoding =
            PublicKeyEncoding::from_u8(encoding_byte).ok_or(ParseError::UnknownTag {
                field: "key encoding",
                tag: encoding_byte,
            })?;
        let signature = MessageSignature(take::<SIGNATURE_LENGTH>(buf, "signature")?);
        return Ok(SpendingCondition::Singlesig(SingleSigSpendingCondition {
            hash_mode,
            signer,
            nonce,
            fee,
            key_encoding,
            signature,
        }));
    }

    need(buf, 4, "auth field count")?;
    let count = buf.get_u32() as usize;
    if count > MAX_MULTISIG_KEYS {
        return Err(ParseError::InvalidField {
            field: "auth fields",
            reason: format!("{} fields, at most {} allowed", count, MAX_MULTISIG_KEYS),
        });
    }
    if count > buf.remaining() / MIN_FIELD_LENGTH {
        return Err(ParseError::UnexpectedEnd {
            field: "auth fields",
            needed: count.saturating_mul(MIN_FIELD_LENGTH),
            remaining: buf.remaining(),
        });
    }
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(decode_auth_field(buf)?);
    }

    need(buf, 2, "signatures required")?;
    let signatures_required = buf.get_u16();
    if signatures_required == 0 || usize::from(signatures_required) > count {
        return Err(ParseError::InvalidField {
            field: "signatures required",
            reason: format!(
                "threshold {} must be between 1 and the field count {}",
                signatures_required, count
            ),
        });
    }

    Ok(SpendingCondition::Multisig(MultiSigSpendingCondition {
        hash_mode,
        signer,
        nonce,
        fee,
        fields,
        signatures_required,
    }))
}

fn decode_auth_field(buf: &mut &[u8]) -> Result<AuthField, ParseError> {
    need(buf, 1, "auth field")?;
    let tag = buf.get_u8();
    match tag {
        FIELD_PUBLIC_KEY_COMPRESSED | FIELD_PUBLIC_KEY_UNCOMPRESSED => {
            let bytes = take::<PUBLIC_KEY_WIRE_LENGTH>(buf, "public key")?;
            let key = PublicKey::from_slice(&bytes).map_err(|e| ParseError::InvalidField {
                field: "public key",
                reason: e.to_string(),
            })?;
            Ok(AuthField::PublicKey(StacksPublicKey::new(
                key,
                tag == FIELD_PUBLIC_KEY_COMPRESSED,
            )))
        }
        FIELD_SIGNATURE_COMPRESSED | FIELD_SIGNATURE_UNCOMPRESSED => {
            let signature = MessageSignature(take::<SIGNATURE_LENGTH>(buf, "signature")?);
            let encoding = if tag == FIELD_SIGNATURE_COMPRESSED {
                PublicKeyEncoding::Compressed
            } else {
                PublicKeyEncoding::Uncompressed
            };
            Ok(AuthField::Signature(encoding, signature))
        }
        other => Err(ParseError::UnknownTag {
            field: "auth field",
            tag: other,
        }),
    }
}

fn decode_payload(buf: &mut &[u8]) -> Result<TransactionPayload, ParseError> {
    need(buf, 1, "payload type")?;
    let payload_type = buf.get_u8();
    if payload_type != PAYLOAD_TOKEN_TRANSFER {
        return Err(ParseError::UnknownTag {
            field: "payload type",
            tag: payload_type,
        });
    }

    let recipient = decode_principal(buf)?;
    need(buf, 8, "amount")?;
    let amount = buf.get_u64();
    let memo_bytes = take::<MEMO_LENGTH>(buf, "memo")?;
    let memo = Memo::new(&memo_bytes).map_err(|e| ParseError::InvalidField {
        field: "memo",
        reason: e.to_string(),
    })?;

    Ok(TransactionPayload::TokenTransfer {
        recipient,
        amount,
        memo,
    })
}

fn decode_principal(buf: &mut &[u8]) -> Result<PrincipalData, ParseError> {
    need(buf, 1, "principal type")?;
    let principal_type = buf.get_u8();
    need(buf, 1, "address version")?;
    let version = buf.get_u8();
    let hash160 = take::<20>(buf, "address hash")?;
    let address = StacksAddress::new(version, hash160).map_err(|e| ParseError::InvalidField {
        field: "address version",
        reason: e.to_string(),
    })?;

    match principal_type {
        PRINCIPAL_STANDARD => Ok(PrincipalData::Standard(address)),
        PRINCIPAL_CONTRACT => {
            need(buf, 1, "contract name length")?;
            let len = buf.get_u8() as usize;
            need(buf, len, "contract name")?;
            let name = String::from_utf8(buf[..len].to_vec()).map_err(|_| {
                ParseError::InvalidField {
                    field: "contract name",
                    reason: "not UTF-8".to_string(),
                }
            })?;
            buf.advance(len);
            validate_contract_name(&name).map_err(|e| ParseError::InvalidField {
                field: "contract name",
                reason: e.to_string(),
            })?;
            Ok(PrincipalData::Contract(address, name))
        }
        other => Err(ParseError::UnknownTag {
            field: "principal",
            tag: other,
        }),
    }
}
