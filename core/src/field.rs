//! Encoding helpers between ledger byte strings and field elements.
//!
//! The ledger stores field elements as `vector<u8>` in little-endian order
//! (the first byte is the least significant). Addresses are fed to the
//! circuits as field elements too, after clearing their top byte.

use ark_babyjubjub::Fq;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::constants::{ADDRESS_BYTES, FIELD_BYTES};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("invalid hex string {0:?}")]
    InvalidHex(String),
    #[error("address must be {ADDRESS_BYTES} bytes, got {0}")]
    AddressLength(usize),
    #[error("value {0} is not below the field modulus")]
    OutOfRange(String),
    #[error("not a decimal integer: {0:?}")]
    InvalidDecimal(String),
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Lowercase hex without prefix.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Inverse of [`bytes_to_hex`]. Accepts an optional `0x` prefix; odd lengths are rejected.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, FieldError> {
    hex::decode(strip_0x(s)).map_err(|_| FieldError::InvalidHex(s.to_string()))
}

/// Little-endian integer: `bytes[0]` is the least significant byte.
pub fn le_bytes_to_int(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_le(bytes)
}

fn modulus() -> BigUint {
    Fq::MODULUS.into()
}

/// Reduces nothing: values at or above the modulus are an error.
pub fn field_from_int(n: &BigUint) -> Result<Fq, FieldError> {
    if *n >= modulus() {
        return Err(FieldError::OutOfRange(n.to_string()));
    }
    Ok(Fq::from_le_bytes_mod_order(&n.to_bytes_le()))
}

pub fn field_from_decimal(s: &str) -> Result<Fq, FieldError> {
    let n = BigUint::parse_bytes(s.trim().as_bytes(), 10)
        .ok_or_else(|| FieldError::InvalidDecimal(s.to_string()))?;
    field_from_int(&n)
}

/// Decimal string, the representation the proving backend expects.
pub fn field_to_decimal(f: &Fq) -> String {
    BigUint::from(f.into_bigint()).to_string()
}

/// Decodes a ledger `vector<u8>` (hex, little-endian) into a field element.
pub fn hex_le_to_field(s: &str) -> Result<Fq, FieldError> {
    let bytes = hex_to_bytes(s)?;
    field_from_int(&le_bytes_to_int(&bytes))
}

/// 32-byte little-endian hex, the inverse of [`hex_le_to_field`].
pub fn field_to_le_hex(f: &Fq) -> String {
    let mut bytes = f.into_bigint().to_bytes_le();
    bytes.resize(FIELD_BYTES, 0);
    bytes_to_hex(&bytes)
}

/// `0x` followed by exactly 64 hex digits. The indexer strips leading zeros
/// from addresses; the ledger API wants them back.
pub fn padded_address(s: &str) -> Result<String, FieldError> {
    let digits = strip_0x(s);
    if digits.len() > ADDRESS_BYTES * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FieldError::InvalidHex(s.to_string()));
    }
    Ok(format!("0x{:0>64}", digits.to_ascii_lowercase()))
}

/// Address as a circuit input. Byte 31 is the most significant byte in the
/// little-endian reading; it is zeroed so the result is below 2^248 and
/// therefore below the field modulus for every address.
pub fn address_to_field(address: &str) -> Result<Fq, FieldError> {
    let mut bytes = hex_to_bytes(&padded_address(address)?)?;
    if bytes.len() != ADDRESS_BYTES {
        return Err(FieldError::AddressLength(bytes.len()));
    }
    bytes[ADDRESS_BYTES - 1] = 0;
    field_from_int(&le_bytes_to_int(&bytes))
}
