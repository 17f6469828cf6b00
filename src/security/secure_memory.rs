//! Secure Memory Utilities
//!
//! Containers for seed material:
//! - Zeroization on drop
//! - Redacted `Debug` output
//! - Constant-time comparison

use std::fmt;
use std::ops::Deref;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Owned secret bytes (entropy, private keys) that are wiped when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes {
    data: Vec<u8>,
}

impl SecretBytes {
    /// Take ownership of the bytes; the caller's copy is moved, not cloned
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Copy from a slice
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Deref for SecretBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl PartialEq for SecretBytes {
    fn eq(&self, other: &Self) -> bool {
        secure_compare(&self.data, &other.data)
    }
}

impl Eq for SecretBytes {}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Constant-time equality; length mismatch returns early
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Redact bytes for logging
pub fn redact_bytes(data: &[u8]) -> String {
    if data.len() <= 8 {
        return "****".to_string();
    }

    format!(
        "{}...{}",
        hex::encode(&data[..4]),
        hex::encode(&data[data.len() - 4..])
    )
}

/// Validate that data appears to be properly zeroized
pub fn is_zeroized(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}
