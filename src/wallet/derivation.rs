//! HD Address Derivation
//!
//! Turns a wallet's entropy and a derivation coordinate into a public key
//! and address. Seeds are materialised for one call and dropped (zeroed)
//! on every exit path.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use super::derivation_path::{DerivationPath, PathError};
use super::keygen::seed_from_entropy;
use super::keystore::{HdWalletAddress, StorageError, WalletKeyStore};
use super::model::{AccountError, AccountInformation, HdWalletAddressDetail, Wallet};
use crate::crypto::address::{encode_address, AddressError};
use crate::crypto::port::{DerivationType, KeyDerivationPort, SdkError, HARDENED};
use crate::types::{Address, WalletId};
use crate::log_debug;

#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("invalid entropy: {0}")]
    InvalidEntropy(String),
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("entropy generation failed")]
    EntropyGenerationFailed,
    #[error("wallet not found: {0}")]
    WalletNotFound(String),
    #[error("coordinate belongs to wallet {expected}, not {actual}")]
    WalletMismatch { expected: String, actual: String },
    #[error("account index space exhausted")]
    AccountIndexExhausted,
    #[error("derivation state lock poisoned")]
    Poisoned,
    #[error("key derivation failed: {0}")]
    Sdk(#[from] SdkError),
    #[error("derived key is not a valid public key: {0}")]
    InvalidPublicKey(#[from] AddressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("account lookup failed: {0}")]
    Lookup(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(#[from] PathError),
    #[error(transparent)]
    InvalidAccount(#[from] AccountError),
}

/// `m/44'/283'/{account}'/{change}/{key_index}`
pub fn derivation_path(account: u32, change: u32, key_index: u32) -> Result<String, PathError> {
    DerivationPath::new(account, change, key_index).map(|path| path.to_string())
}

/// Run `f` with the wallet's BIP-39 seed; the seed is zeroed when `f` returns
pub fn with_wallet_seed<S, T, E, F>(store: &S, wallet_id: &str, f: F) -> Result<T, E>
where
    S: WalletKeyStore + ?Sized,
    F: FnOnce(&[u8]) -> Result<T, E>,
    E: From<DerivationError>,
{
    let entropy = store
        .entropy(wallet_id)
        .map_err(DerivationError::from)?
        .ok_or_else(|| DerivationError::WalletNotFound(wallet_id.to_string()))?;
    let seed = seed_from_entropy(&entropy)?;
    drop(entropy);
    f(&seed[..])
}

/// Result of deriving one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub public_key: [u8; 32],
    pub address: Address,
    pub detail: HdWalletAddressDetail,
}

impl DerivedAddress {
    pub fn into_record(self) -> HdWalletAddress {
        HdWalletAddress {
            address: self.address,
            public_key: self.public_key,
            detail: self.detail,
        }
    }
}

/// Derives addresses through a `KeyDerivationPort`
pub struct HdAddressDeriver<P> {
    port: P,
    /// Highest account index handed out or retired per wallet this session
    issued: Mutex<HashMap<WalletId, u32>>,
}

impl<P: KeyDerivationPort> HdAddressDeriver<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Deterministic: the same entropy and coordinate always give the same address
    pub fn derive_address(
        &self,
        wallet: &Wallet,
        detail: &HdWalletAddressDetail,
    ) -> Result<DerivedAddress, DerivationError> {
        if detail.wallet_id != wallet.id {
            return Err(DerivationError::WalletMismatch {
                expected: detail.wallet_id.clone(),
                actual: wallet.id.clone(),
            });
        }
        let seed = seed_from_entropy(&wallet.entropy)?;
        self.derive_with_seed(&seed[..], detail)
    }

    /// Same as `derive_address`, reading entropy from the key store
    pub fn derive_address_from_store<S: WalletKeyStore + ?Sized>(
        &self,
        store: &S,
        detail: &HdWalletAddressDetail,
    ) -> Result<DerivedAddress, DerivationError> {
        with_wallet_seed(store, &detail.wallet_id, |seed| self.derive_with_seed(seed, detail))
    }

    pub(crate) fn derive_with_seed(
        &self,
        seed: &[u8],
        detail: &HdWalletAddressDetail,
    ) -> Result<DerivedAddress, DerivationError> {
        DerivationPath::new(detail.account, detail.change, detail.key_index)?;
        let public = self.port.generate_key(seed, &detail.coordinate())?;
        let address = encode_address(&public)?;
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&public);

        log_debug!(
            "wallet.derivation",
            "derived address",
            account = detail.account,
            key_index = detail.key_index,
            address = address,
        );

        Ok(DerivedAddress {
            public_key,
            address,
            detail: detail.clone(),
        })
    }

    /// `max(existing account indices of the wallet) + 1`, or 0 for an empty wallet.
    /// Indices issued or retired earlier in this session are never handed out again.
    pub fn next_account_index(
        &self,
        wallet_id: &str,
        accounts: &[AccountInformation],
    ) -> Result<u32, DerivationError> {
        let issued = self.issued.lock().map_err(|_| DerivationError::Poisoned)?;
        Self::next_index_locked(&issued, wallet_id, accounts)
    }

    fn next_index_locked(
        issued: &HashMap<WalletId, u32>,
        wallet_id: &str,
        accounts: &[AccountInformation],
    ) -> Result<u32, DerivationError> {
        let existing = accounts
            .iter()
            .filter_map(|account| account.hd_wallet_address_detail.as_ref())
            .filter(|detail| detail.wallet_id == wallet_id)
            .map(|detail| detail.account)
            .max();

        let floor = existing.into_iter().chain(issued.get(wallet_id).copied()).max();
        let next = match floor {
            None => 0,
            Some(highest) => highest
                .checked_add(1)
                .ok_or(DerivationError::AccountIndexExhausted)?,
        };
        if next >= HARDENED {
            return Err(DerivationError::AccountIndexExhausted);
        }
        Ok(next)
    }

    /// Derive the first address of the next free account
    pub fn derive_next_address(
        &self,
        wallet: &Wallet,
        accounts: &[AccountInformation],
        derivation_type: DerivationType,
    ) -> Result<DerivedAddress, DerivationError> {
        // Held across derivation so concurrent callers cannot pick the same index
        let mut issued = self.issued.lock().map_err(|_| DerivationError::Poisoned)?;
        let account = Self::next_index_locked(&issued, &wallet.id, accounts)?;

        let mut detail = HdWalletAddressDetail::new(wallet.id.clone(), account, 0, 0);
        detail.derivation_type = derivation_type;
        let derived = self.derive_address(wallet, &detail)?;

        issued.insert(wallet.id.clone(), account);
        Ok(derived)
    }

    /// Keep a removed account's index from being reissued this session
    pub fn retire_account(&self, detail: &HdWalletAddressDetail) {
        if let Ok(mut issued) = self.issued.lock() {
            let entry = issued.entry(detail.wallet_id.clone()).or_insert(detail.account);
            *entry = (*entry).max(detail.account);
        }
    }
}
