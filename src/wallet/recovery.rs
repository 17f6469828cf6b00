//! Account Recovery
//!
//! Scans a restored wallet for addresses with on-chain history. The scan
//! stops after `gap_limit` consecutive empty accounts; inside an account it
//! stops after `gap_limit` consecutive empty addresses.

use async_trait::async_trait;

use super::derivation::{DerivationError, DerivedAddress, HdAddressDeriver};
use super::model::{HdWalletAddressDetail, Wallet};
use crate::crypto::port::{DerivationType, KeyDerivationPort};
use crate::types::MicroAlgos;
use crate::utils::network_config::{CoreConfig, DEFAULT_GAP_LIMIT};
use crate::{log_debug, log_info};

/// Chain lookup used during recovery
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// `Some(balance)` when the address has on-chain history
    async fn lookup(&self, address: &str) -> Result<Option<MicroAlgos>, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredAddress {
    pub derived: DerivedAddress,
    /// `None` for the fallback address returned when nothing was found
    pub balance: Option<MicroAlgos>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOptions {
    pub gap_limit: u32,
    pub derivation_type: DerivationType,
}

impl RecoveryOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            gap_limit: config.gap_limit,
            derivation_type: config.derivation_type,
        }
    }
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            gap_limit: DEFAULT_GAP_LIMIT,
            derivation_type: DerivationType::default(),
        }
    }
}

/// Addresses of `wallet` found on chain, in derivation order.
/// When nothing is found the first address (account 0, index 0) is returned alone.
pub async fn recover_accounts<P, L>(
    deriver: &HdAddressDeriver<P>,
    wallet: &Wallet,
    lookup: &L,
    options: RecoveryOptions,
) -> Result<Vec<RecoveredAddress>, DerivationError>
where
    P: KeyDerivationPort,
    L: AccountLookup + ?Sized,
{
    let detail = |account: u32, key_index: u32| {
        let mut detail = HdWalletAddressDetail::new(wallet.id.clone(), account, 0, key_index);
        detail.derivation_type = options.derivation_type;
        detail
    };

    let mut found = Vec::new();
    let mut empty_accounts = 0u32;
    let mut account = 0u32;

    while empty_accounts < options.gap_limit {
        let mut empty_addresses = 0u32;
        let mut key_index = 0u32;

        while empty_addresses < options.gap_limit {
            let derived = deriver.derive_address(wallet, &detail(account, key_index))?;
            let balance = lookup
                .lookup(&derived.address)
                .await
                .map_err(DerivationError::Lookup)?;

            match balance {
                Some(balance) => {
                    log_debug!(
                        "wallet.recovery",
                        "found used address",
                        account = account,
                        key_index = key_index,
                        address = derived.address,
                    );
                    found.push(RecoveredAddress { derived, balance: Some(balance) });
                    empty_addresses = 0;
                    empty_accounts = 0;
                }
                None => empty_addresses += 1,
            }
            key_index += 1;
        }

        empty_accounts += 1;
        account += 1;
    }

    log_info!(
        "wallet.recovery",
        "recovery scan finished",
        found = found.len(),
        accounts_scanned = account,
    );

    if found.is_empty() {
        let derived = deriver.derive_address(wallet, &detail(0, 0))?;
        found.push(RecoveredAddress { derived, balance: None });
    }
    Ok(found)
}
