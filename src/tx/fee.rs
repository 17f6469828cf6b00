//! Fee and Minimum Balance Rules
//!
//! Every account must keep a protocol minimum balance that grows with the
//! assets it holds and the applications it created or opted into.

use serde::{Deserialize, Serialize};

use crate::types::{Address, MicroAlgos};

pub const BASE_MIN_BALANCE: MicroAlgos = 100_000;
pub const ASSET_MIN_BALANCE: MicroAlgos = 100_000;
pub const APP_MIN_BALANCE: MicroAlgos = 100_000;
pub const APP_UINT_MIN_BALANCE: MicroAlgos = 28_500;
pub const APP_BYTE_SLICE_MIN_BALANCE: MicroAlgos = 50_000;
pub const APP_EXTRA_PAGE_MIN_BALANCE: MicroAlgos = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub asset_id: u64,
    pub amount: u64,
    #[serde(default)]
    pub is_frozen: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSchema {
    pub num_uint: u64,
    pub num_byte_slice: u64,
}

/// On-chain snapshot of a sending account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: Address,
    pub amount: MicroAlgos,
    /// Minimum balance reported by the node, when known
    #[serde(default)]
    pub min_balance: Option<MicroAlgos>,
    #[serde(default)]
    pub auth_address: Option<Address>,
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
    #[serde(default)]
    pub total_created_apps: u64,
    #[serde(default)]
    pub apps_local_state: u64,
    #[serde(default)]
    pub apps_total_schema: AppSchema,
    #[serde(default)]
    pub apps_total_extra_pages: u64,
}

impl AccountState {
    pub fn new(address: impl Into<Address>, amount: MicroAlgos) -> Self {
        Self {
            address: address.into(),
            amount,
            min_balance: None,
            auth_address: None,
            assets: Vec::new(),
            total_created_apps: 0,
            apps_local_state: 0,
            apps_total_schema: AppSchema::default(),
            apps_total_extra_pages: 0,
        }
    }

    pub fn is_rekeyed(&self) -> bool {
        self.auth_address
            .as_deref()
            .is_some_and(|auth| auth != self.address)
    }

    /// Holds anything that raises the minimum balance above the base amount
    pub fn has_different_min_balance(&self) -> bool {
        !self.assets.is_empty()
            || self.total_created_apps > 0
            || self.apps_local_state > 0
            || self.apps_total_schema.num_uint > 0
            || self.apps_total_schema.num_byte_slice > 0
            || self.apps_total_extra_pages > 0
    }

    pub fn computed_min_balance(&self) -> MicroAlgos {
        let apps = self.total_created_apps.saturating_add(self.apps_local_state);
        BASE_MIN_BALANCE
            .saturating_add(ASSET_MIN_BALANCE.saturating_mul(self.assets.len() as u64))
            .saturating_add(APP_MIN_BALANCE.saturating_mul(apps))
            .saturating_add(APP_UINT_MIN_BALANCE.saturating_mul(self.apps_total_schema.num_uint))
            .saturating_add(
                APP_BYTE_SLICE_MIN_BALANCE.saturating_mul(self.apps_total_schema.num_byte_slice),
            )
            .saturating_add(APP_EXTRA_PAGE_MIN_BALANCE.saturating_mul(self.apps_total_extra_pages))
    }

    /// Node-reported minimum balance, falling back to the computed one
    pub fn required_minimum_balance(&self) -> MicroAlgos {
        self.min_balance.unwrap_or_else(|| self.computed_min_balance())
    }

    pub fn holding(&self, asset_id: u64) -> Option<&AssetHolding> {
        self.assets.iter().find(|holding| holding.asset_id == asset_id)
    }
}

/// Transaction shapes that affect the minimum balance differently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTransactionKind {
    Algo,
    Asset,
    AssetAddition,
    AssetRemoval,
    Rekey,
}

/// Lowest balance the account may hold. With `is_after_transaction` the
/// fee of the pending transaction is included.
pub fn calculate_minimum_amount(
    account: &AccountState,
    kind: FeeTransactionKind,
    fee: MicroAlgos,
    is_after_transaction: bool,
) -> MicroAlgos {
    let base = account.required_minimum_balance();
    let minimum = match kind {
        FeeTransactionKind::AssetAddition => base.saturating_add(ASSET_MIN_BALANCE),
        FeeTransactionKind::AssetRemoval => base.saturating_sub(ASSET_MIN_BALANCE),
        FeeTransactionKind::Algo | FeeTransactionKind::Asset | FeeTransactionKind::Rekey => base,
    };
    if is_after_transaction {
        minimum.saturating_add(fee)
    } else {
        minimum
    }
}

/// Balance still covers the minimum after paying `fee`
pub fn is_valid_transaction_amount(
    account: &AccountState,
    kind: FeeTransactionKind,
    fee: MicroAlgos,
) -> bool {
    account.amount >= calculate_minimum_amount(account, kind, fee, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: &str = "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ";

    /// Six assets: 700_000 minimum balance
    fn funded_account() -> AccountState {
        let mut account = AccountState::new(SENDER, 2_000_000);
        account.assets = (1..=6)
            .map(|asset_id| AssetHolding { asset_id, amount: 10, is_frozen: false })
            .collect();
        account
    }

    #[test]
    fn test_minimum_after_transaction() {
        let account = funded_account();
        let after = |kind| calculate_minimum_amount(&account, kind, 1_000, true);
        assert_eq!(after(FeeTransactionKind::Algo), 701_000);
        assert_eq!(after(FeeTransactionKind::Asset), 701_000);
        assert_eq!(after(FeeTransactionKind::AssetAddition), 801_000);
        assert_eq!(after(FeeTransactionKind::AssetRemoval), 601_000);
        assert_eq!(after(FeeTransactionKind::Rekey), 701_000);
        assert_eq!(calculate_minimum_amount(&account, FeeTransactionKind::Algo, 1_000, false), 700_000);
    }

    #[test]
    fn test_valid_transaction_amount() {
        let mut account = funded_account();
        assert!(is_valid_transaction_amount(&account, FeeTransactionKind::AssetAddition, 1_000));
        account.amount = 600_000;
        assert!(!is_valid_transaction_amount(&account, FeeTransactionKind::Algo, 1_000));
        assert!(!is_valid_transaction_amount(&account, FeeTransactionKind::AssetRemoval, 1_000));
    }

    #[test]
    fn test_app_schema_min_balance() {
        let mut account = AccountState::new(SENDER, 0);
        assert!(!account.has_different_min_balance());
        assert_eq!(account.computed_min_balance(), 100_000);

        account.total_created_apps = 1;
        account.apps_total_schema = AppSchema { num_uint: 2, num_byte_slice: 1 };
        account.apps_total_extra_pages = 1;
        assert!(account.has_different_min_balance());
        assert_eq!(account.computed_min_balance(), 100_000 + 100_000 + 57_000 + 50_000 + 100_000);

        account.min_balance = Some(123_456);
        assert_eq!(account.required_minimum_balance(), 123_456);
    }

    #[test]
    fn test_rekeyed() {
        let mut account = AccountState::new(SENDER, 0);
        account.auth_address = Some(SENDER.into());
        assert!(!account.is_rekeyed());
        account.auth_address = Some("EZRVNZFJGOUZC67FUMEC7ZMVP232TPICFTQCVZ6EQEIRRT3TIHSKZULRNI".into());
        assert!(account.is_rekeyed());
    }
}
