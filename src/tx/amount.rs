//! Transaction Amount Calculator
//!
//! Decides how many microAlgos a payment actually moves. A max send from a
//! plain account only reserves the fee; an account that is rekeyed or holds
//! anything raising its minimum balance also keeps that minimum back.

use serde::{Deserialize, Serialize};

use super::draft::AlgosTransactionSendDraft;
use super::fee::{calculate_minimum_amount, FeeTransactionKind};
use super::params::TransactionParams;
use crate::types::MicroAlgos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountCalculation {
    pub amount: MicroAlgos,
    pub minimum_account_balance: MicroAlgos,
    pub fee: MicroAlgos,
    /// Whether the remainder may be closed to the receiver
    pub is_max_transaction: bool,
}

pub struct TransactionAmountCalculator<'a> {
    params: &'a TransactionParams,
    initial_size: Option<usize>,
}

impl<'a> TransactionAmountCalculator<'a> {
    /// `initial_size` is the estimated encoded size used to project the fee
    pub fn new(params: &'a TransactionParams, initial_size: Option<usize>) -> Self {
        Self { params, initial_size }
    }

    pub fn calculate(&self, draft: &AlgosTransactionSendDraft) -> AmountCalculation {
        let fee = draft
            .fee
            .unwrap_or_else(|| self.params.projected_fee(self.initial_size));
        let minimum_for_account =
            calculate_minimum_amount(&draft.from, FeeTransactionKind::Algo, fee, true);
        let minimum_account_balance = minimum_for_account
            .checked_sub(fee)
            .unwrap_or(minimum_for_account);

        let requested = draft.amount.map(clamp_non_negative).unwrap_or(0);

        if !draft.is_max_transaction {
            return AmountCalculation {
                amount: requested,
                minimum_account_balance,
                fee,
                is_max_transaction: false,
            };
        }

        let restricted =
            draft.is_max_transaction_from_rekeyed_account() || draft.from.has_different_min_balance();
        let reserved = if restricted {
            fee.saturating_add(minimum_account_balance)
        } else {
            fee
        };

        AmountCalculation {
            amount: requested.checked_sub(reserved).unwrap_or(0),
            minimum_account_balance,
            fee,
            is_max_transaction: !restricted && requested == draft.from.amount,
        }
    }
}

fn clamp_non_negative(amount: i64) -> MicroAlgos {
    u64::try_from(amount).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::fee::{AccountState, AssetHolding};

    const SENDER: &str = "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ";
    const AUTH: &str = "EZRVNZFJGOUZC67FUMEC7ZMVP232TPICFTQCVZ6EQEIRRT3TIHSKZULRNI";

    fn params() -> TransactionParams {
        TransactionParams {
            fee: 0,
            min_fee: 1_000,
            last_round: 1,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: vec![0u8; 32],
        }
    }

    fn max_draft(from: AccountState) -> AlgosTransactionSendDraft {
        let mut draft = AlgosTransactionSendDraft::new(from.clone());
        draft.amount = Some(from.amount as i64);
        draft.is_max_transaction = true;
        draft
    }

    #[test]
    fn test_plain_max_reserves_fee_only() {
        let params = params();
        let draft = max_draft(AccountState::new(SENDER, 10_000_000));
        let result = TransactionAmountCalculator::new(&params, None).calculate(&draft);

        assert_eq!(result.amount, 9_999_000);
        assert_eq!(result.fee, 1_000);
        assert_eq!(result.minimum_account_balance, 100_000);
        assert!(result.is_max_transaction);
    }

    #[test]
    fn test_max_with_assets_keeps_minimum_balance() {
        let params = params();
        let mut from = AccountState::new(SENDER, 10_000_000);
        from.assets.push(AssetHolding { asset_id: 31566704, amount: 5, is_frozen: false });
        let result = TransactionAmountCalculator::new(&params, None).calculate(&max_draft(from));

        assert_eq!(result.minimum_account_balance, 200_000);
        assert_eq!(result.amount, 10_000_000 - 1_000 - 200_000);
        assert!(!result.is_max_transaction);
    }

    #[test]
    fn test_rekeyed_max_keeps_minimum_balance() {
        let params = params();
        let mut from = AccountState::new(SENDER, 10_000_000);
        from.auth_address = Some(AUTH.into());
        let result = TransactionAmountCalculator::new(&params, None).calculate(&max_draft(from));

        assert_eq!(result.amount, 10_000_000 - 1_000 - 100_000);
        assert!(!result.is_max_transaction);
    }

    #[test]
    fn test_max_underflow_floors_at_zero() {
        let params = params();
        let mut from = AccountState::new(SENDER, 50_000);
        from.auth_address = Some(AUTH.into());
        let result = TransactionAmountCalculator::new(&params, None).calculate(&max_draft(from));
        assert_eq!(result.amount, 0);

        let tiny = max_draft(AccountState::new(SENDER, 500));
        assert_eq!(TransactionAmountCalculator::new(&params, None).calculate(&tiny).amount, 0);
    }

    #[test]
    fn test_max_flag_requires_full_balance() {
        let params = params();
        let mut draft = max_draft(AccountState::new(SENDER, 10_000_000));
        draft.amount = Some(5_000_000);
        let result = TransactionAmountCalculator::new(&params, None).calculate(&draft);
        assert_eq!(result.amount, 4_999_000);
        assert!(!result.is_max_transaction);
    }

    #[test]
    fn test_regular_send() {
        let params = params();
        let mut draft = AlgosTransactionSendDraft::new(AccountState::new(SENDER, 10_000_000));
        draft.amount = Some(2_500_000);
        let result = TransactionAmountCalculator::new(&params, None).calculate(&draft);
        assert_eq!(result.amount, 2_500_000);

        draft.amount = Some(-5);
        assert_eq!(TransactionAmountCalculator::new(&params, None).calculate(&draft).amount, 0);
        draft.amount = None;
        assert_eq!(TransactionAmountCalculator::new(&params, None).calculate(&draft).amount, 0);
    }

    #[test]
    fn test_fee_override() {
        let params = params();
        let mut draft = max_draft(AccountState::new(SENDER, 10_000_000));
        draft.fee = Some(2_000);
        let result = TransactionAmountCalculator::new(&params, None).calculate(&draft);
        assert_eq!(result.fee, 2_000);
        assert_eq!(result.amount, 9_998_000);
    }

    #[test]
    fn test_size_hint_raises_fee() {
        let mut params = params();
        params.fee = 10;
        let draft = max_draft(AccountState::new(SENDER, 10_000_000));
        let result = TransactionAmountCalculator::new(&params, Some(300)).calculate(&draft);
        assert_eq!(result.fee, 3_000);
        assert_eq!(result.amount, 9_997_000);
    }
}
