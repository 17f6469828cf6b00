//! Wallet and account data model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::crypto::address::is_valid_address;
use crate::crypto::port::{DerivationType, KeyCoordinate};
use crate::security::SecretBytes;
use crate::types::{Address, WalletId};

/// Order value meaning "no explicit display position"
pub const UNORDERED: i32 = -1;

/// An HD wallet: one entropy, many derived addresses
#[derive(Clone, PartialEq, Eq)]
pub struct Wallet {
    pub id: WalletId,
    pub name: String,
    pub entropy: SecretBytes,
}

impl Wallet {
    /// New wallet with a fresh UUID identifier
    pub fn new(name: impl Into<String>, entropy: SecretBytes) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            entropy,
        }
    }

    pub fn with_id(id: impl Into<WalletId>, name: impl Into<String>, entropy: SecretBytes) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entropy,
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entropy", &self.entropy)
            .finish()
    }
}

/// Coordinate of one derived address inside a wallet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HdWalletAddressDetail {
    pub wallet_id: WalletId,
    pub account: u32,
    pub change: u32,
    pub key_index: u32,
    #[serde(default)]
    pub derivation_type: DerivationType,
}

impl HdWalletAddressDetail {
    pub fn new(wallet_id: impl Into<WalletId>, account: u32, change: u32, key_index: u32) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            account,
            change,
            key_index,
            derivation_type: DerivationType::default(),
        }
    }

    pub fn coordinate(&self) -> KeyCoordinate {
        KeyCoordinate::address(self.account, self.change, self.key_index, self.derivation_type)
    }

    /// `m/44'/283'/{account}'/{change}/{key_index}`
    pub fn derivation_path(&self) -> Result<String, super::derivation_path::PathError> {
        super::derivation::derivation_path(self.account, self.change, self.key_index)
    }
}

/// Hardware device identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerDetail {
    /// Device identifier (BLE peripheral id)
    pub id: String,
    pub name: String,
    pub index_in_ledger: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Standard,
    Watch,
    Ledger,
    Rekeyed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("invalid account address: {0}")]
    InvalidAddress(String),
    #[error("account {0} cannot be both HD-derived and hardware-keyed")]
    ConflictingKeySource(String),
    #[error("watch account {0} cannot carry key material details")]
    WatchWithKeyDetail(String),
}

/// One addressable entity the user controls or watches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInformation {
    pub address: Address,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(default)]
    pub ledger_detail: Option<LedgerDetail>,
    /// Authorizing address -> hardware device holding its key
    #[serde(default)]
    pub rekey_detail: Option<BTreeMap<Address, LedgerDetail>>,
    #[serde(default)]
    pub hd_wallet_address_detail: Option<HdWalletAddressDetail>,
    /// Last known on-chain authorizing address
    #[serde(default)]
    pub auth_address: Option<Address>,
    #[serde(default = "unordered")]
    pub preferred_order: i32,
    #[serde(default)]
    pub is_backed_up: bool,
}

fn unordered() -> i32 {
    UNORDERED
}

impl AccountInformation {
    fn base(address: impl Into<Address>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            account_type,
            ledger_detail: None,
            rekey_detail: None,
            hd_wallet_address_detail: None,
            auth_address: None,
            preferred_order: UNORDERED,
            is_backed_up: false,
        }
    }

    /// Legacy single-key account
    pub fn standard(address: impl Into<Address>, name: impl Into<String>) -> Self {
        Self::base(address, name, AccountType::Standard)
    }

    pub fn watch(address: impl Into<Address>, name: impl Into<String>) -> Self {
        Self::base(address, name, AccountType::Watch)
    }

    pub fn ledger(address: impl Into<Address>, name: impl Into<String>, detail: LedgerDetail) -> Self {
        let mut account = Self::base(address, name, AccountType::Ledger);
        account.ledger_detail = Some(detail);
        account
    }

    pub fn hd(address: impl Into<Address>, name: impl Into<String>, detail: HdWalletAddressDetail) -> Self {
        let mut account = Self::base(address, name, AccountType::Standard);
        account.hd_wallet_address_detail = Some(detail);
        account
    }

    /// Mark the account as delegated to `auth_address`
    pub fn rekeyed_to(mut self, auth_address: impl Into<Address>, ledger: Option<LedgerDetail>) -> Self {
        let auth_address = auth_address.into();
        if let Some(detail) = ledger {
            self.rekey_detail
                .get_or_insert_with(BTreeMap::new)
                .insert(auth_address.clone(), detail);
        }
        self.auth_address = Some(auth_address);
        self.account_type = AccountType::Rekeyed;
        self
    }

    pub fn is_hd(&self) -> bool {
        self.hd_wallet_address_detail.is_some()
    }

    pub fn is_watch(&self) -> bool {
        self.account_type == AccountType::Watch
    }

    /// Signing authority differs from the account itself
    pub fn has_auth_account(&self) -> bool {
        self.auth_address
            .as_deref()
            .is_some_and(|auth| auth != self.address)
    }

    /// Address whose key must sign for this account
    pub fn signer_address(&self) -> &str {
        match self.auth_address.as_deref() {
            Some(auth) if self.has_auth_account() => auth,
            _ => &self.address,
        }
    }

    /// Ledger device that holds the current signing key, if any
    pub fn current_ledger_detail(&self) -> Option<&LedgerDetail> {
        if self.has_auth_account() {
            let auth = self.auth_address.as_deref()?;
            return self.rekey_detail.as_ref()?.get(auth);
        }
        self.ledger_detail.as_ref()
    }

    pub fn validate(&self) -> Result<(), AccountError> {
        if !is_valid_address(&self.address) {
            return Err(AccountError::InvalidAddress(self.address.clone()));
        }
        if self.is_watch() && (self.is_hd() || self.ledger_detail.is_some()) {
            return Err(AccountError::WatchWithKeyDetail(self.address.clone()));
        }
        if self.is_hd() && (self.account_type == AccountType::Ledger || self.ledger_detail.is_some()) {
            return Err(AccountError::ConflictingKeySource(self.address.clone()));
        }
        Ok(())
    }
}
