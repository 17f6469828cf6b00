//! Algorand address codec
//!
//! An address is the base32 (no padding) encoding of the 32-byte Ed25519
//! public key followed by the last 4 bytes of its SHA-512/256 digest.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha512_256};
use thiserror::Error;

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const CHECKSUM_LENGTH: usize = 4;
pub const ADDRESS_LENGTH: usize = 58;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be {ADDRESS_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("address is not valid base32")]
    InvalidEncoding,
    #[error("address checksum mismatch")]
    ChecksumMismatch,
    #[error("public key must be {PUBLIC_KEY_LENGTH} bytes, got {0}")]
    InvalidPublicKey(usize),
}

fn checksum(public_key: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let hash = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&hash[hash.len() - CHECKSUM_LENGTH..]);
    out
}

/// Encode a 32-byte public key as an address
pub fn encode_address(public_key: &[u8]) -> Result<String, AddressError> {
    if public_key.len() != PUBLIC_KEY_LENGTH {
        return Err(AddressError::InvalidPublicKey(public_key.len()));
    }

    let mut address_bytes = Vec::with_capacity(PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH);
    address_bytes.extend_from_slice(public_key);
    address_bytes.extend_from_slice(&checksum(public_key));

    Ok(BASE32_NOPAD.encode(&address_bytes))
}

/// Decode an address back to its public key, verifying the checksum
pub fn decode_address(address: &str) -> Result<[u8; PUBLIC_KEY_LENGTH], AddressError> {
    let trimmed = address.trim();
    if trimmed.len() != ADDRESS_LENGTH {
        return Err(AddressError::InvalidLength(trimmed.len()));
    }

    let decoded = BASE32_NOPAD
        .decode(trimmed.as_bytes())
        .map_err(|_| AddressError::InvalidEncoding)?;
    if decoded.len() != PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH {
        return Err(AddressError::InvalidEncoding);
    }

    let (key, check) = decoded.split_at(PUBLIC_KEY_LENGTH);
    if checksum(key) != check {
        return Err(AddressError::ChecksumMismatch);
    }

    let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
    public_key.copy_from_slice(key);
    Ok(public_key)
}

/// Check address format and checksum
pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}
