//! Local Transaction Signer
//!
//! Signs with keys held on this device: HD keys derived per call from the
//! wallet entropy, or legacy single keys from the key store. Hardware
//! signing lives in the batch driver.

use ed25519_dalek::{Signer, SigningKey};
use thiserror::Error;
use zeroize::Zeroizing;

use super::batch::LedgerError;
use super::transaction::{attach_signature, bytes_to_sign, TransactionComposer};
use crate::crypto::address::encode_address;
use crate::crypto::port::{KeyDerivationPort, SdkError};
use crate::log_debug;
use crate::types::Address;
use crate::wallet::authorization::SignerPath;
use crate::wallet::derivation::{with_wallet_seed, DerivationError};
use crate::wallet::keystore::{StorageError, WalletKeyStore};
use crate::wallet::model::HdWalletAddressDetail;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("no signing key stored for {0}")]
    MissingKey(Address),
    #[error("stored key does not match {0}")]
    KeyMismatch(Address),
    #[error("account cannot sign")]
    Unsignable,
    #[error("signing path requires a hardware signer")]
    RequiresHardware,
    #[error(transparent)]
    Derivation(#[from] DerivationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("signing failed: {0}")]
    Sdk(#[from] SdkError),
    #[error("hardware signer: {0}")]
    Ledger(#[from] LedgerError),
}

/// Signs with HD or legacy keys from the key store
pub struct LocalTransactionSigner<'a, P, S: ?Sized, C: ?Sized> {
    port: &'a P,
    store: &'a S,
    composer: &'a C,
}

impl<'a, P, S, C> LocalTransactionSigner<'a, P, S, C>
where
    P: KeyDerivationPort,
    S: WalletKeyStore + ?Sized,
    C: TransactionComposer + ?Sized,
{
    pub fn new(port: &'a P, store: &'a S, composer: &'a C) -> Self {
        Self { port, store, composer }
    }

    /// Signed transaction bytes for `unsigned`
    pub fn sign(&self, path: &SignerPath, unsigned: &[u8]) -> Result<Vec<u8>, SigningError> {
        let (signer, signature) = match path {
            SignerPath::LocalHd { address, detail } => (address, self.sign_hd(detail, unsigned)?),
            SignerPath::LocalLegacy { address } => (address, self.sign_legacy(address, unsigned)?),
            SignerPath::Hardware { .. } => return Err(SigningError::RequiresHardware),
            SignerPath::Unsignable => return Err(SigningError::Unsignable),
        };
        log_debug!("tx.signer", "signed transaction", signer = signer);
        Ok(attach_signature(self.composer, unsigned, &signature, Some(signer.as_str()))?)
    }

    fn sign_hd(&self, detail: &HdWalletAddressDetail, unsigned: &[u8]) -> Result<Vec<u8>, SigningError> {
        let message = bytes_to_sign(unsigned);
        with_wallet_seed(self.store, &detail.wallet_id, |seed| {
            self.port
                .sign_algorand_transaction(seed, &detail.coordinate(), &message)
                .map_err(SigningError::from)
        })
    }

    fn sign_legacy(&self, address: &str, unsigned: &[u8]) -> Result<Vec<u8>, SigningError> {
        let stored = self
            .store
            .private_key(address)?
            .ok_or_else(|| SigningError::MissingKey(address.to_string()))?;
        // 32-byte seed, or the 64-byte seed || public key form
        if stored.len() != 32 && stored.len() != 64 {
            return Err(SigningError::KeyMismatch(address.to_string()));
        }
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&stored[..32]);
        drop(stored);

        let key = SigningKey::from_bytes(&seed);
        let derived = encode_address(key.verifying_key().as_bytes())
            .map_err(|e| SdkError::InvalidPublicKey(e.to_string()))?;
        if derived != address {
            return Err(SigningError::KeyMismatch(address.to_string()));
        }
        Ok(key.sign(&bytes_to_sign(unsigned)).to_bytes().to_vec())
    }
}
