//! Wallet Key Store
//!
//! Persists per-wallet entropy keyed by wallet id, public address records
//! per wallet, and legacy private keys keyed by address. Derived keys are
//! never stored; address records carry only public data.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use thiserror::Error;

use super::model::{HdWalletAddressDetail, Wallet};
use crate::security::SecretBytes;
use crate::types::Address;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to decode stored record: {0}")]
    Decode(String),
    #[error("failed to encrypt record: {0}")]
    Encryption(String),
    #[error("failed to decrypt record {0}")]
    Decryption(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("key store lock poisoned")]
    Poisoned,
}

/// Public record of one derived address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdWalletAddress {
    pub address: Address,
    #[serde(with = "crate::serde_bytes::hex32")]
    pub public_key: [u8; 32],
    pub detail: HdWalletAddressDetail,
}

impl HdWalletAddress {
    pub fn wallet_id(&self) -> &str {
        &self.detail.wallet_id
    }
}

/// Secure storage for key material
pub trait WalletKeyStore: Send + Sync {
    fn save_wallet(&self, wallet: &Wallet) -> Result<(), StorageError>;

    fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, StorageError>;

    /// Removes the wallet entropy and every address record of the wallet
    fn delete_wallet(&self, wallet_id: &str) -> Result<(), StorageError>;

    fn save_address(&self, record: &HdWalletAddress) -> Result<(), StorageError>;

    fn address(&self, wallet_id: &str, address: &str) -> Result<Option<HdWalletAddress>, StorageError>;

    fn addresses(&self, wallet_id: &str) -> Result<Vec<HdWalletAddress>, StorageError>;

    fn delete_address(&self, wallet_id: &str, address: &str) -> Result<(), StorageError>;

    fn save_private_key(&self, address: &str, key: &SecretBytes) -> Result<(), StorageError>;

    fn private_key(&self, address: &str) -> Result<Option<SecretBytes>, StorageError>;

    fn delete_private_key(&self, address: &str) -> Result<(), StorageError>;

    fn entropy(&self, wallet_id: &str) -> Result<Option<SecretBytes>, StorageError> {
        Ok(self.wallet(wallet_id)?.map(|wallet| wallet.entropy.clone()))
    }
}

/// In-process key store
#[derive(Default)]
pub struct MemoryKeyStore {
    wallets: RwLock<HashMap<String, Wallet>>,
    addresses: RwLock<BTreeMap<(String, Address), HdWalletAddress>>,
    private_keys: RwLock<HashMap<Address, SecretBytes>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletKeyStore for MemoryKeyStore {
    fn save_wallet(&self, wallet: &Wallet) -> Result<(), StorageError> {
        let mut wallets = self.wallets.write().map_err(|_| StorageError::Poisoned)?;
        wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }

    fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, StorageError> {
        let wallets = self.wallets.read().map_err(|_| StorageError::Poisoned)?;
        Ok(wallets.get(wallet_id).cloned())
    }

    fn delete_wallet(&self, wallet_id: &str) -> Result<(), StorageError> {
        self.wallets
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .remove(wallet_id);
        self.addresses
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .retain(|(owner, _), _| owner != wallet_id);
        Ok(())
    }

    fn save_address(&self, record: &HdWalletAddress) -> Result<(), StorageError> {
        let mut addresses = self.addresses.write().map_err(|_| StorageError::Poisoned)?;
        addresses.insert(
            (record.wallet_id().to_string(), record.address.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn address(&self, wallet_id: &str, address: &str) -> Result<Option<HdWalletAddress>, StorageError> {
        let addresses = self.addresses.read().map_err(|_| StorageError::Poisoned)?;
        Ok(addresses
            .get(&(wallet_id.to_string(), address.to_string()))
            .cloned())
    }

    fn addresses(&self, wallet_id: &str) -> Result<Vec<HdWalletAddress>, StorageError> {
        let addresses = self.addresses.read().map_err(|_| StorageError::Poisoned)?;
        Ok(addresses
            .iter()
            .filter(|((owner, _), _)| owner == wallet_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn delete_address(&self, wallet_id: &str, address: &str) -> Result<(), StorageError> {
        let mut addresses = self.addresses.write().map_err(|_| StorageError::Poisoned)?;
        addresses.remove(&(wallet_id.to_string(), address.to_string()));
        Ok(())
    }

    fn save_private_key(&self, address: &str, key: &SecretBytes) -> Result<(), StorageError> {
        let mut keys = self.private_keys.write().map_err(|_| StorageError::Poisoned)?;
        keys.insert(address.to_string(), key.clone());
        Ok(())
    }

    fn private_key(&self, address: &str) -> Result<Option<SecretBytes>, StorageError> {
        let keys = self.private_keys.read().map_err(|_| StorageError::Poisoned)?;
        Ok(keys.get(address).cloned())
    }

    fn delete_private_key(&self, address: &str) -> Result<(), StorageError> {
        let mut keys = self.private_keys.write().map_err(|_| StorageError::Poisoned)?;
        keys.remove(address);
        Ok(())
    }
}
