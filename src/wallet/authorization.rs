//! Account Authorization
//!
//! Decides which key must sign for an account. Signing authority, not
//! derivation origin, decides the path: a rekeyed account always follows
//! its authorizing key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::model::{AccountError, AccountInformation, AccountType, HdWalletAddressDetail, LedgerDetail};
use crate::log_warn;
use crate::types::Address;

/// How a transaction for an account gets signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignerPath {
    LocalHd {
        address: Address,
        detail: HdWalletAddressDetail,
    },
    LocalLegacy {
        address: Address,
    },
    Hardware {
        address: Address,
        ledger_detail: LedgerDetail,
    },
    Unsignable,
}

impl SignerPath {
    pub fn is_signable(&self) -> bool {
        !matches!(self, SignerPath::Unsignable)
    }

    /// Address whose key produces the signature
    pub fn signer_address(&self) -> Option<&str> {
        match self {
            SignerPath::LocalHd { address, .. }
            | SignerPath::LocalLegacy { address }
            | SignerPath::Hardware { address, .. } => Some(address),
            SignerPath::Unsignable => None,
        }
    }
}

/// Resolves signer paths against the locally known accounts
#[derive(Debug, Default)]
pub struct AccountAuthorizationResolver<'a> {
    accounts: HashMap<&'a str, &'a AccountInformation>,
}

impl<'a> AccountAuthorizationResolver<'a> {
    pub fn new(accounts: &'a [AccountInformation]) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|account| (account.address.as_str(), account))
                .collect(),
        }
    }

    pub fn account(&self, address: &str) -> Option<&'a AccountInformation> {
        self.accounts.get(address).copied()
    }

    /// Unknown addresses are unsignable
    pub fn resolve_address(&self, address: &str) -> SignerPath {
        self.account(address)
            .map(|account| self.resolve(account))
            .unwrap_or(SignerPath::Unsignable)
    }

    /// Accounts that fail validation never sign
    pub fn resolve(&self, account: &AccountInformation) -> SignerPath {
        if let Err(e) = account.validate() {
            log_warn!("wallet.authorization", "account rejected", reason = kind(&e));
            return SignerPath::Unsignable;
        }

        if account.account_type == AccountType::Watch {
            return SignerPath::Unsignable;
        }

        if let Some((address, ledger_detail)) = delegated_ledger(account) {
            return SignerPath::Hardware { address, ledger_detail };
        }

        if account.account_type == AccountType::Ledger {
            return match &account.ledger_detail {
                Some(detail) => SignerPath::Hardware {
                    address: account.address.clone(),
                    ledger_detail: detail.clone(),
                },
                None => SignerPath::Unsignable,
            };
        }

        if account.has_auth_account() {
            return self
                .account(account.signer_address())
                .filter(|auth| auth.validate().is_ok())
                .map(key_path)
                .unwrap_or(SignerPath::Unsignable);
        }

        if let Some(detail) = &account.hd_wallet_address_detail {
            return SignerPath::LocalHd {
                address: account.address.clone(),
                detail: detail.clone(),
            };
        }

        SignerPath::LocalLegacy {
            address: account.address.clone(),
        }
    }
}

fn kind(error: &AccountError) -> &'static str {
    match error {
        AccountError::InvalidAddress(_) => "invalid_address",
        AccountError::ConflictingKeySource(_) => "conflicting_key_source",
        AccountError::WatchWithKeyDetail(_) => "watch_with_key_detail",
    }
}

/// Ledger holding the delegated authority's key, if the account is rekeyed to one
fn delegated_ledger(account: &AccountInformation) -> Option<(Address, LedgerDetail)> {
    let rekey_detail = account.rekey_detail.as_ref()?;
    if account.has_auth_account() {
        let auth = account.signer_address();
        return rekey_detail
            .get(auth)
            .map(|detail| (auth.to_string(), detail.clone()));
    }
    if account.auth_address.is_none() && rekey_detail.len() == 1 {
        return rekey_detail
            .iter()
            .next()
            .map(|(auth, detail)| (auth.clone(), detail.clone()));
    }
    None
}

/// Path for the account that holds the signing key itself
fn key_path(account: &AccountInformation) -> SignerPath {
    if account.is_watch() {
        return SignerPath::Unsignable;
    }
    if let Some(detail) = &account.hd_wallet_address_detail {
        return SignerPath::LocalHd {
            address: account.address.clone(),
            detail: detail.clone(),
        };
    }
    if let Some(detail) = &account.ledger_detail {
        return SignerPath::Hardware {
            address: account.address.clone(),
            ledger_detail: detail.clone(),
        };
    }
    if account.account_type == AccountType::Ledger {
        return SignerPath::Unsignable;
    }
    SignerPath::LocalLegacy {
        address: account.address.clone(),
    }
}
