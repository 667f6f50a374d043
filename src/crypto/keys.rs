//! ECDSA key management for Stacks
//!
//! Provides key pair generation, private-key normalization, public keys and
//! recoverable signatures over the secp256k1 curve.
//!
//! Private keys arrive in one of three textual forms:
//! - 66 hex chars ending in `01`: compressed-public-key private key
//! - 64 hex chars: uncompressed-public-key private key
//! - BIP32 extended private key (`xprv` / `tprv`), always compressed

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Length of a recoverable signature on the wire: recovery id || r || s
pub const SIGNATURE_LENGTH: usize = 65;

/// BIP32 serialized extended key length (without checksum)
const EXTENDED_KEY_LENGTH: usize = 78;

/// BIP32 version prefixes
const XPRV_MAINNET: [u8; 4] = [0x04, 0x88, 0xad, 0xe4];
const XPRV_TESTNET: [u8; 4] = [0x04, 0x35, 0x83, 0x94];
const XPUB_MAINNET: [u8; 4] = [0x04, 0x88, 0xb2, 0x1e];
const XPUB_TESTNET: [u8; 4] = [0x04, 0x35, 0x87, 0xcf];

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Unsupported private key")]
    UnsupportedKey,
    #[error("Missing private key")]
    MissingPrivateKey,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

// =============================================================================
// Public Keys
// =============================================================================

/// A secp256k1 public key together with its wire encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StacksPublicKey {
    pub key: PublicKey,
    pub compressed: bool,
}

impl StacksPublicKey {
    pub fn new(key: PublicKey, compressed: bool) -> Self {
        Self { key, compressed }
    }

    /// Parse a 33-byte compressed or 65-byte uncompressed public key
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let compressed = match bytes.len() {
            33 => true,
            65 => false,
            _ => return Err(KeyError::InvalidPublicKey),
        };
        let key = PublicKey::from_slice(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { key, compressed })
    }

    /// Parse a hex-encoded public key
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_slice(&bytes)
    }

    /// Serialized key in its own encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.key.serialize().to_vec()
        } else {
            self.key.serialize_uncompressed().to_vec()
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether two keys are the same curve point, regardless of encoding
    pub fn same_point(&self, other: &StacksPublicKey) -> bool {
        self.key == other.key
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// A recoverable ECDSA signature serialized as `recovery_id || r || s`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageSignature(pub [u8; SIGNATURE_LENGTH]);

impl MessageSignature {
    /// The all-zero placeholder written for an unsigned single-sig condition
    pub fn empty() -> Self {
        Self([0u8; SIGNATURE_LENGTH])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse 65 bytes of hex, checking the recovery id and scalars
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(text.trim()).map_err(|_| KeyError::InvalidSignature)?;
        let bytes: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSignature)?;
        let signature = Self(bytes);
        signature.to_recoverable()?;
        Ok(signature)
    }

    fn from_recoverable(signature: &RecoverableSignature) -> Self {
        let (recovery_id, compact) = signature.serialize_compact();
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[0] = recovery_id.to_i32() as u8;
        bytes[1..].copy_from_slice(&compact);
        Self(bytes)
    }

    fn to_recoverable(&self) -> Result<RecoverableSignature, KeyError> {
        let recovery_id =
            RecoveryId::from_i32(i32::from(self.0[0])).map_err(|_| KeyError::InvalidSignature)?;
        RecoverableSignature::from_compact(&self.0[1..], recovery_id)
            .map_err(|_| KeyError::InvalidSignature)
    }

    /// Recover the public key that produced this signature over `digest`
    pub fn recover(&self, digest: &[u8; 32], compressed: bool) -> Result<StacksPublicKey, KeyError> {
        let secp = Secp256k1::verification_only();
        let message = Message::from_digest_slice(digest)?;
        let key = secp
            .recover_ecdsa(&message, &self.to_recoverable()?)
            .map_err(|_| KeyError::InvalidSignature)?;
        Ok(StacksPublicKey::new(key, compressed))
    }
}

impl std::fmt::Debug for MessageSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageSignature({})", self.to_hex())
    }
}

// =============================================================================
// Key Pairs
// =============================================================================

/// A private key with its public key and encoding flag
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: StacksPublicKey,
}

impl KeyPair {
    /// Generate a new random key pair (compressed)
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key: StacksPublicKey::new(public_key, true),
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey, compressed: bool) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key: StacksPublicKey::new(public_key, compressed),
        }
    }

    /// Create a key pair from a hex-encoded private key
    ///
    /// A trailing `01` byte marks a key whose public key is compressed.
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let (raw, compressed) = match bytes.len() {
            32 => (&bytes[..], false),
            33 if bytes[32] == 0x01 => (&bytes[..32], true),
            _ => return Err(KeyError::InvalidPrivateKey),
        };
        let secret_key = SecretKey::from_slice(raw).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key, compressed))
    }

    /// Create a key pair from a BIP32 extended private key
    pub fn from_extended_key(xprv: &str) -> Result<Self, KeyError> {
        let payload = decode_extended(xprv).ok_or(KeyError::InvalidPrivateKey)?;
        if payload[..4] != XPRV_MAINNET && payload[..4] != XPRV_TESTNET {
            return Err(KeyError::InvalidPrivateKey);
        }
        // key data: 0x00 || 32-byte private key
        if payload[45] != 0x00 {
            return Err(KeyError::InvalidPrivateKey);
        }
        let secret_key =
            SecretKey::from_slice(&payload[46..78]).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key, true))
    }

    /// Normalize any supported private key text into a key pair
    ///
    /// Public key material is reported as `MissingPrivateKey` so callers can
    /// tell "wrong half of the key pair" from "not a key at all".
    ///
    /// 66 hex chars ending in `01` are always read as a compressed private
    /// key, even when they also spell a valid compressed public key. Real
    /// private keys take that shape too, so the text alone cannot tell them
    /// apart; a builder that knows the sender keys rejects such a "key" as an
    /// unknown signer.
    pub fn parse(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        if let Ok(key_pair) = Self::from_private_key_hex(text) {
            return Ok(key_pair);
        }
        if let Ok(key_pair) = Self::from_extended_key(text) {
            return Ok(key_pair);
        }
        if is_public_key_text(text) {
            return Err(KeyError::MissingPrivateKey);
        }
        Err(KeyError::UnsupportedKey)
    }

    /// Private key as hex, with the `01` suffix for compressed keys
    pub fn private_key_hex(&self) -> String {
        let mut encoded = hex::encode(self.secret_key.secret_bytes());
        if self.public_key.compressed {
            encoded.push_str("01");
        }
        encoded
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    pub fn is_compressed(&self) -> bool {
        self.public_key.compressed
    }

    /// Sign a 32-byte digest, producing a recoverable signature
    pub fn sign(&self, digest: &[u8; 32]) -> Result<MessageSignature, KeyError> {
        sign_recoverable(&self.secret_key, digest)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key.to_hex())
            .finish_non_exhaustive()
    }
}

/// Sign a digest with a secret key (RFC 6979 nonce, low-S)
pub fn sign_recoverable(
    secret_key: &SecretKey,
    digest: &[u8; 32],
) -> Result<MessageSignature, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(digest)?;
    let signature = secp.sign_ecdsa_recoverable(&message, secret_key);
    Ok(MessageSignature::from_recoverable(&signature))
}

fn decode_extended(text: &str) -> Option<Vec<u8>> {
    let payload = bs58::decode(text).with_check(None).into_vec().ok()?;
    (payload.len() == EXTENDED_KEY_LENGTH).then_some(payload)
}

fn is_public_key_text(text: &str) -> bool {
    if StacksPublicKey::from_hex(text).is_ok() {
        return true;
    }
    match decode_extended(text) {
        Some(payload) => {
            (payload[..4] == XPUB_MAINNET || payload[..4] == XPUB_TESTNET)
                && StacksPublicKey::from_slice(&payload[45..78]).is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha512_256;

    const PRV_COMPRESSED: &str = "21d43d2ae0da1d9d04cfcaac7d397a33733881081f0b2cd038062cf0ccbb752601";

    /// BIP32 test vector 1, master key
    const XPRV: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    const XPRV_KEY: &str = "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35";
    const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert!(kp.is_compressed());
        assert_eq!(kp.private_key_hex().len(), 66);
        assert_eq!(kp.public_key_hex().len(), 66);
    }

    #[test]
    fn test_compressed_private_key_round_trip() {
        let kp = KeyPair::from_private_key_hex(PRV_COMPRESSED).unwrap();
        assert!(kp.is_compressed());
        assert_eq!(kp.private_key_hex(), PRV_COMPRESSED);
        assert_eq!(kp.public_key.to_bytes().len(), 33);
    }

    #[test]
    fn test_uncompressed_private_key() {
        let kp = KeyPair::from_private_key_hex(&PRV_COMPRESSED[..64]).unwrap();
        assert!(!kp.is_compressed());
        assert_eq!(kp.public_key.to_bytes().len(), 65);
        assert_eq!(kp.private_key_hex(), &PRV_COMPRESSED[..64]);
    }

    #[test]
    fn test_extended_private_key() {
        let kp = KeyPair::from_extended_key(XPRV).unwrap();
        assert!(kp.is_compressed());
        assert_eq!(kp.private_key_hex(), format!("{}01", XPRV_KEY));
    }

    #[test]
    fn test_parse_forms() {
        assert!(KeyPair::parse(PRV_COMPRESSED).is_ok());
        assert!(KeyPair::parse(XPRV).is_ok());
        assert!(matches!(
            KeyPair::parse("invalidKey"),
            Err(KeyError::UnsupportedKey)
        ));
        assert!(matches!(
            KeyPair::parse(XPUB),
            Err(KeyError::MissingPrivateKey)
        ));

        let public = KeyPair::from_private_key_hex(PRV_COMPRESSED)
            .unwrap()
            .public_key_hex();
        assert!(matches!(
            KeyPair::parse(&public),
            Err(KeyError::MissingPrivateKey)
        ));
    }

    #[test]
    fn test_public_key_shaped_like_private_key() {
        let public = (0..4096)
            .map(|_| KeyPair::generate().public_key_hex())
            .find(|hex| hex.ends_with("01"))
            .unwrap();
        let kp = KeyPair::parse(&public).unwrap();
        assert_eq!(kp.private_key_hex(), public);
        assert_ne!(kp.public_key_hex(), public);
    }

    #[test]
    fn test_signature_from_hex() {
        let kp = KeyPair::from_private_key_hex(PRV_COMPRESSED).unwrap();
        let signature = kp.sign(&sha512_256(b"stacks")).unwrap();
        assert_eq!(
            MessageSignature::from_hex(&signature.to_hex()).unwrap(),
            signature
        );
        assert!(MessageSignature::from_hex("abcd").is_err());
        let mut bad = signature.to_hex();
        bad.replace_range(0..2, "09");
        assert!(matches!(
            MessageSignature::from_hex(&bad),
            Err(KeyError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unsupported_key_message() {
        let err = KeyPair::parse("invalidKey").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported private key");
    }

    #[test]
    fn test_sign_is_deterministic_and_recoverable() {
        let kp = KeyPair::from_private_key_hex(PRV_COMPRESSED).unwrap();
        let digest = sha512_256(b"stacks");

        let first = kp.sign(&digest).unwrap();
        let second = kp.sign(&digest).unwrap();
        assert_eq!(first, second);
        assert!(first.0[0] <= 3);

        let recovered = first.recover(&digest, true).unwrap();
        assert_eq!(recovered, kp.public_key);
    }

    #[test]
    fn test_recover_rejects_bad_recovery_id() {
        let kp = KeyPair::generate();
        let digest = sha512_256(b"stacks");
        let mut signature = kp.sign(&digest).unwrap();
        signature.0[0] = 9;
        assert!(signature.recover(&digest, true).is_err());
    }

    #[test]
    fn test_public_key_parsing() {
        let kp = KeyPair::generate();
        let parsed = StacksPublicKey::from_hex(&kp.public_key_hex()).unwrap();
        assert_eq!(parsed, kp.public_key);
        assert!(StacksPublicKey::from_hex("02abcd").is_err());
        assert!(StacksPublicKey::from_hex("zz").is_err());
    }
}
