//! Key derivation port
//!
//! Narrow interface to the HD key primitives. Every operation that touches
//! secret material receives the BIP-39 seed explicitly; nothing holds a seed
//! between calls. Callers own the seed buffer and zero it afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// BIP-44 purpose used for every Algorand HD path
pub const BIP44_PURPOSE: u32 = 44;
/// SLIP-44 coin type for Algorand addresses
pub const ALGORAND_COIN_TYPE: u32 = 283;
/// Coin type used for identity keys
pub const IDENTITY_COIN_TYPE: u32 = 0;
/// Hardened index offset
pub const HARDENED: u32 = 0x8000_0000;

/// Prefixes that must never be signed as arbitrary data
pub const PROHIBITED_DATA_PREFIXES: [&[u8]; 4] = [b"TX", b"MX", b"progData", b"Program"];

/// Failures reported by key derivation primitives
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdkError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
    #[error("invalid extended key: expected {expected} bytes, got {actual}")]
    InvalidExtendedKey { expected: usize, actual: usize },
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("public derivation is impossible for hardened index {0}")]
    HardenedPublicDerivation(u32),
    #[error("index {0} is outside the 31-bit index space")]
    IndexOutOfRange(u32),
    #[error("data failed validation and will not be signed")]
    InvalidData,
    #[error("transaction compose failed: {0}")]
    Compose(String),
    #[error("{0}")]
    Native(String),
}

pub type SdkResult<T> = Result<T, SdkError>;

/// Derivation scheme variant; selects how many bits of `zL` are discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationType {
    Khovratovich,
    #[default]
    Peikert,
}

impl DerivationType {
    /// Number of trailing bits cleared from `zL`
    pub fn truncated_bits(self) -> u32 {
        match self {
            DerivationType::Khovratovich => 32,
            DerivationType::Peikert => 9,
        }
    }
}

impl std::str::FromStr for DerivationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "khovratovich" | "bip32-ed25519" => Ok(DerivationType::Khovratovich),
            "peikert" => Ok(DerivationType::Peikert),
            other => Err(format!("unknown derivation type: {}", other)),
        }
    }
}

/// Key purpose; selects the coin type in the path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyContext {
    #[default]
    Address,
    Identity,
}

impl KeyContext {
    pub fn coin_type(self) -> u32 {
        match self {
            KeyContext::Address => ALGORAND_COIN_TYPE,
            KeyContext::Identity => IDENTITY_COIN_TYPE,
        }
    }
}

pub fn harden(index: u32) -> u32 {
    index | HARDENED
}

/// Full path coordinate for one leaf key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCoordinate {
    pub context: KeyContext,
    pub account: u32,
    pub change: u32,
    pub key_index: u32,
    pub derivation_type: DerivationType,
}

impl KeyCoordinate {
    pub fn address(account: u32, change: u32, key_index: u32, derivation_type: DerivationType) -> Self {
        Self {
            context: KeyContext::Address,
            account,
            change,
            key_index,
            derivation_type,
        }
    }

    /// `[44', coin', account', change, key_index]`
    /// Fails when an index would collide with the hardening bit
    pub fn bip44_path(&self) -> SdkResult<[u32; 5]> {
        for index in [self.account, self.change, self.key_index] {
            if index >= HARDENED {
                return Err(SdkError::IndexOutOfRange(index));
            }
        }
        Ok([
            harden(BIP44_PURPOSE),
            harden(self.context.coin_type()),
            harden(self.account),
            self.change,
            self.key_index,
        ])
    }
}

/// Single-step child derivation request
#[derive(Clone)]
pub struct ChildNodeDraft {
    pub extended_key: Zeroizing<Vec<u8>>,
    pub index: u32,
    pub derivation_type: DerivationType,
}

/// Generic path derivation request for callers building custom paths
#[derive(Clone)]
pub struct DeriveKeyDraft {
    pub root_key: Zeroizing<Vec<u8>>,
    pub path: Vec<u32>,
    pub is_private: bool,
    pub derivation_type: DerivationType,
}

/// Encoding of data handed to `sign_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
    #[default]
    None,
    Base64,
}

/// Describes how arbitrary data should be interpreted before signing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignMetadata {
    pub encoding: DataEncoding,
    /// Optional JSON schema; only its `required` keys are enforced
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySignatureDraft {
    pub signature: Vec<u8>,
    pub message: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// HD key primitives consumed by the wallet core
pub trait KeyDerivationPort: Send + Sync {
    /// Soft child of an extended public key (`pk || chain code`)
    fn derive_public_child_node(&self, draft: &ChildNodeDraft) -> SdkResult<Vec<u8>>;

    /// Child of an extended private key (`kL || kR || chain code`)
    fn derive_private_child_node(&self, draft: &ChildNodeDraft) -> SdkResult<Zeroizing<Vec<u8>>>;

    /// Public key at a full coordinate
    fn generate_key(&self, seed: &[u8], coordinate: &KeyCoordinate) -> SdkResult<Vec<u8>>;

    fn derive_key(&self, draft: &DeriveKeyDraft) -> SdkResult<Zeroizing<Vec<u8>>>;

    /// Sign bytes that already carry the `TX` domain prefix
    fn sign_algorand_transaction(
        &self,
        seed: &[u8],
        coordinate: &KeyCoordinate,
        prefix_encoded_tx: &[u8],
    ) -> SdkResult<Vec<u8>>;

    fn sign_data(
        &self,
        seed: &[u8],
        coordinate: &KeyCoordinate,
        data: &[u8],
        metadata: &SignMetadata,
    ) -> SdkResult<Vec<u8>>;

    fn verify_signature(&self, draft: &VerifySignatureDraft) -> bool;

    fn validate_data(&self, data: &[u8], metadata: &SignMetadata) -> bool;

    /// Shared secret with a counterparty; `me_first` fixes operand order
    fn perform_ecdh(
        &self,
        seed: &[u8],
        coordinate: &KeyCoordinate,
        other_party_public_key: &[u8],
        me_first: bool,
    ) -> SdkResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bip44_path() {
        let coordinate = KeyCoordinate::address(3, 0, 7, DerivationType::Peikert);
        assert_eq!(
            coordinate.bip44_path().unwrap(),
            [HARDENED + 44, HARDENED + 283, HARDENED + 3, 0, 7]
        );

        let identity = KeyCoordinate { context: KeyContext::Identity, ..coordinate };
        assert_eq!(identity.bip44_path().unwrap()[1], HARDENED);
    }

    #[test]
    fn test_bip44_path_rejects_top_bit_indices() {
        let aliased = KeyCoordinate::address(HARDENED, 0, 0, DerivationType::Peikert);
        assert_eq!(aliased.bip44_path(), Err(SdkError::IndexOutOfRange(HARDENED)));

        let hardened_soft_step = KeyCoordinate::address(0, 0, HARDENED + 5, DerivationType::Peikert);
        assert_eq!(hardened_soft_step.bip44_path(), Err(SdkError::IndexOutOfRange(HARDENED + 5)));
    }

    #[test]
    fn test_derivation_type_parsing() {
        assert_eq!("peikert".parse::<DerivationType>().unwrap(), DerivationType::Peikert);
        assert_eq!("Khovratovich".parse::<DerivationType>().unwrap(), DerivationType::Khovratovich);
        assert!("slip10".parse::<DerivationType>().is_err());
        assert_eq!(DerivationType::default().truncated_bits(), 9);
    }
}
