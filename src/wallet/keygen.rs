//! Entropy and Mnemonic Handling
//!
//! Fresh wallets get 256 bits of OS entropy (24 words). Seeds are always
//! derived on demand from entropy and returned in zeroizing buffers.

use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::derivation::DerivationError;
use crate::security::SecretBytes;

/// 256-bit entropy
pub const ENTROPY_LENGTH: usize = 32;
/// Words in a 256-bit mnemonic
pub const MNEMONIC_WORD_COUNT: usize = 24;

/// Generate fresh wallet entropy from the OS RNG
pub fn generate_entropy() -> Result<SecretBytes, DerivationError> {
    let mut entropy = Zeroizing::new([0u8; ENTROPY_LENGTH]);
    OsRng
        .try_fill_bytes(entropy.as_mut())
        .map_err(|_| DerivationError::EntropyGenerationFailed)?;
    Ok(SecretBytes::from_slice(entropy.as_ref()))
}

fn check_entropy(entropy: &[u8]) -> Result<(), DerivationError> {
    if entropy.len() != ENTROPY_LENGTH {
        return Err(DerivationError::InvalidEntropy(format!(
            "expected {} bytes, got {}",
            ENTROPY_LENGTH,
            entropy.len()
        )));
    }
    Ok(())
}

/// 24-word phrase for backup display
pub fn mnemonic_from_entropy(entropy: &[u8]) -> Result<Zeroizing<String>, DerivationError> {
    check_entropy(entropy)?;
    let mnemonic = Mnemonic::from_entropy(entropy)
        .map_err(|e| DerivationError::InvalidEntropy(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Recover entropy from a 24-word phrase
pub fn entropy_from_mnemonic(phrase: &str) -> Result<SecretBytes, DerivationError> {
    let mnemonic = Mnemonic::parse(phrase.trim())
        .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))?;
    if mnemonic.word_count() != MNEMONIC_WORD_COUNT {
        return Err(DerivationError::InvalidMnemonic(format!(
            "expected {} words, got {}",
            MNEMONIC_WORD_COUNT,
            mnemonic.word_count()
        )));
    }
    Ok(SecretBytes::new(mnemonic.to_entropy()))
}

/// BIP-39 seed (empty passphrase) for the given entropy
pub fn seed_from_entropy(entropy: &[u8]) -> Result<Zeroizing<[u8; 64]>, DerivationError> {
    check_entropy(entropy)?;
    let mnemonic = Mnemonic::from_entropy(entropy)
        .map_err(|e| DerivationError::InvalidEntropy(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}
