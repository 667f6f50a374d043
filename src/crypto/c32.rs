//! Crockford-style base32 ("c32") and c32check encoding
//!
//! Stacks addresses are `S` followed by the c32check encoding of an
//! address version and a 20-byte hash. c32 is a plain base-32 conversion of
//! the big-endian integer, with one leading `0` per leading zero byte.

use thiserror::Error;

use super::hash::double_sha256;

/// The c32 alphabet (no I, L, O, U)
pub const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Largest version a single c32 character can carry
pub const MAX_C32_VERSION: u8 = 31;

/// Errors produced while decoding c32 text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid c32 character: {0:?}")]
    InvalidCharacter(char),
    #[error("Invalid c32check checksum")]
    InvalidChecksum,
    #[error("Invalid address length")]
    InvalidLength,
    #[error("Address must start with 'S'")]
    MissingPrefix,
    #[error("Invalid address version: {0}")]
    InvalidVersion(u8),
}

/// Encode bytes as c32
pub fn c32_encode(data: &[u8]) -> String {
    let leading_zeros = data.iter().take_while(|b| **b == 0).count();

    // Repeated division by 32 of the big-endian number, least significant digit first
    let mut digits = Vec::new();
    let mut number: Vec<u8> = data[leading_zeros..].to_vec();
    while !number.is_empty() {
        let mut quotient = Vec::with_capacity(number.len());
        let mut remainder = 0u32;
        for byte in &number {
            let acc = (remainder << 8) | u32::from(*byte);
            let q = acc / 32;
            remainder = acc % 32;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q as u8);
            }
        }
        digits.push(C32_ALPHABET[remainder as usize] as char);
        number = quotient;
    }

    let mut encoded = "0".repeat(leading_zeros);
    encoded.extend(digits.iter().rev());
    encoded
}

/// Decode c32 text into bytes
///
/// Input is normalized first: lowercase is accepted, `O` reads as `0` and
/// `I`/`L` read as `1`.
pub fn c32_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    let normalized = normalize(input);

    let mut values = Vec::with_capacity(normalized.len());
    for c in normalized.chars() {
        let value = C32_ALPHABET
            .iter()
            .position(|a| *a as char == c)
            .ok_or(AddressError::InvalidCharacter(c))?;
        values.push(value as u32);
    }

    let leading_zeros = values.iter().take_while(|v| **v == 0).count();

    let mut number: Vec<u8> = Vec::new();
    for value in &values[leading_zeros..] {
        let mut carry = *value;
        for byte in number.iter_mut().rev() {
            let acc = u32::from(*byte) * 32 + carry;
            *byte = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            number.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let mut decoded = vec![0u8; leading_zeros];
    decoded.extend_from_slice(&number);
    Ok(decoded)
}

/// First four bytes of double SHA-256 over `version || data`
fn c32_checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut payload = Vec::with_capacity(data.len() + 1);
    payload.push(version);
    payload.extend_from_slice(data);
    let hash = double_sha256(&payload);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// c32check-encode a version and payload
pub fn c32check_encode(version: u8, data: &[u8]) -> Result<String, AddressError> {
    if version > MAX_C32_VERSION {
        return Err(AddressError::InvalidVersion(version));
    }
    let mut body = data.to_vec();
    body.extend_from_slice(&c32_checksum(version, data));

    let mut encoded = String::with_capacity(body.len() * 2);
    encoded.push(C32_ALPHABET[version as usize] as char);
    encoded.push_str(&c32_encode(&body));
    Ok(encoded)
}

/// Decode c32check text into its version and payload
pub fn c32check_decode(input: &str) -> Result<(u8, Vec<u8>), AddressError> {
    let normalized = normalize(input);
    let mut chars = normalized.chars();
    let version_char = chars.next().ok_or(AddressError::InvalidLength)?;
    let version = C32_ALPHABET
        .iter()
        .position(|a| *a as char == version_char)
        .ok_or(AddressError::InvalidCharacter(version_char))? as u8;

    let body = c32_decode(chars.as_str())?;
    if body.len() < 4 {
        return Err(AddressError::InvalidLength);
    }
    let (data, checksum) = body.split_at(body.len() - 4);
    if checksum != c32_checksum(version, data) {
        return Err(AddressError::InvalidChecksum);
    }
    Ok((version, data.to_vec()))
}

/// Format a version and hash as a Stacks address (`S` + c32check)
pub fn c32_address(version: u8, hash160: &[u8; 20]) -> Result<String, AddressError> {
    Ok(format!("S{}", c32check_encode(version, hash160)?))
}

/// Parse a Stacks address into its version and 20-byte hash
pub fn c32_address_decode(address: &str) -> Result<(u8, [u8; 20]), AddressError> {
    if address.len() <= 5 {
        return Err(AddressError::InvalidLength);
    }
    let rest = address
        .strip_prefix('S')
        .ok_or(AddressError::MissingPrefix)?;
    let (version, data) = c32check_decode(rest)?;
    let hash: [u8; 20] = data
        .as_slice()
        .try_into()
        .map_err(|_| AddressError::InvalidLength)?;
    Ok((version, hash))
}

fn normalize(input: &str) -> String {
    input
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'O' => '0',
            'L' | 'I' => '1',
            other => other,
        })
        .collect()
}
