//! ARC-59 Asset Inbox
//!
//! Sends an asset to a receiver that has not opted in by routing it through
//! the inbox router application. The router itself may first need to opt
//! into the asset.

use sha2::{Digest, Sha512_256};

use super::builder::{encode_item_bytes, envelope, TransactionDataBuildable, TransactionDataItem, TransactionError};
use super::draft::Arc59TransactionSendDraft;
use super::params::TransactionParams;
use super::transaction::{
    assign_group, AppCallFields, AssetTransferFields, BoxReference, PaymentFields, TransactionBody,
    TransactionComposer,
};
use crate::crypto::address::{decode_address, is_valid_address};
use crate::log_debug;
use crate::types::MicroAlgos;

pub const SEND_ASSET_METHOD: &str = "arc59_sendAsset(axfer,address,uint64)address";
pub const OPT_ROUTER_IN_METHOD: &str = "arc59_optRouterIn(uint64)void";
/// Funds the router needs to opt into one more asset
pub const ROUTER_OPT_IN_FUNDING: MicroAlgos = 100_000;

/// ABI method selector: first four bytes of SHA-512/256 of the signature
pub fn method_selector(signature: &str) -> [u8; 4] {
    let digest = Sha512_256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

pub struct Arc59TransactionDataBuilder<'a, C: ?Sized> {
    params: &'a TransactionParams,
    draft: &'a Arc59TransactionSendDraft,
    composer: &'a C,
}

impl<'a, C: TransactionComposer + ?Sized> Arc59TransactionDataBuilder<'a, C> {
    pub fn new(params: &'a TransactionParams, draft: &'a Arc59TransactionSendDraft, composer: &'a C) -> Self {
        Self { params, draft, composer }
    }

    fn validate(&self) -> Result<(), TransactionError> {
        let draft = self.draft;
        for (role, address) in [
            ("sender", &draft.from.address),
            ("receiver", &draft.receiver),
            ("app", &draft.app_address),
        ] {
            if !is_valid_address(address) {
                return Err(TransactionError::Other(format!("invalid {} address: {}", role, address)));
            }
        }
        if let Some(inbox) = &draft.inbox_account {
            if !is_valid_address(inbox) {
                return Err(TransactionError::Other(format!("invalid inbox address: {}", inbox)));
            }
        }
        Ok(())
    }

    /// Group: [funding payment], asset transfer to the router, `arc59_sendAsset` call
    pub fn compose_send_transaction_data(&self) -> Result<Vec<TransactionDataItem>, TransactionError> {
        self.validate()?;
        let draft = self.draft;
        let min_fee = self.params.min_fee;
        let sender = draft.from.address.as_str();
        let receiver_key = decode_address(&draft.receiver)
            .map_err(|e| TransactionError::Other(e.to_string()))?;

        let mut transactions = Vec::with_capacity(3);

        let funding = draft.min_balance.saturating_add(draft.extra_algo_amount);
        if funding > 0 {
            transactions.push(envelope(
                sender,
                min_fee,
                self.params,
                None,
                TransactionBody::Pay(PaymentFields {
                    receiver: draft.app_address.clone(),
                    amount: funding,
                    close_remainder_to: None,
                }),
            ));
        }

        transactions.push(envelope(
            sender,
            min_fee,
            self.params,
            None,
            TransactionBody::Axfer(AssetTransferFields {
                asset_id: draft.asset_id,
                amount: draft.amount,
                receiver: draft.app_address.clone(),
                close_to: None,
            }),
        ));

        let mut accounts = vec![draft.receiver.clone()];
        accounts.extend(draft.inbox_account.iter().cloned());
        let app_call_fee = min_fee.saturating_mul(draft.inner_transaction_count.saturating_add(1));
        transactions.push(envelope(
            sender,
            app_call_fee,
            self.params,
            None,
            TransactionBody::Appl(AppCallFields {
                app_id: draft.app_id,
                app_args: vec![
                    method_selector(SEND_ASSET_METHOD).to_vec(),
                    receiver_key.to_vec(),
                    draft.extra_algo_amount.to_be_bytes().to_vec(),
                ],
                accounts,
                foreign_assets: vec![draft.asset_id],
                foreign_apps: Vec::new(),
                boxes: vec![BoxReference { app_index: 0, name: receiver_key.to_vec() }],
            }),
        ));

        self.group(transactions)
    }

    /// Group: router funding payment, `arc59_optRouterIn` call
    pub fn compose_opt_in_to_protocol_transaction_data(
        &self,
    ) -> Result<Vec<TransactionDataItem>, TransactionError> {
        self.validate()?;
        let draft = self.draft;
        let min_fee = self.params.min_fee;
        let sender = draft.from.address.as_str();

        let transactions = vec![
            envelope(
                sender,
                min_fee,
                self.params,
                None,
                TransactionBody::Pay(PaymentFields {
                    receiver: draft.app_address.clone(),
                    amount: ROUTER_OPT_IN_FUNDING,
                    close_remainder_to: None,
                }),
            ),
            envelope(
                sender,
                min_fee.saturating_mul(2),
                self.params,
                None,
                TransactionBody::Appl(AppCallFields {
                    app_id: draft.app_id,
                    app_args: vec![
                        method_selector(OPT_ROUTER_IN_METHOD).to_vec(),
                        draft.asset_id.to_be_bytes().to_vec(),
                    ],
                    accounts: Vec::new(),
                    foreign_assets: vec![draft.asset_id],
                    foreign_apps: Vec::new(),
                    boxes: Vec::new(),
                }),
            ),
        ];

        self.group(transactions)
    }

    fn group(
        &self,
        mut transactions: Vec<super::transaction::Transaction>,
    ) -> Result<Vec<TransactionDataItem>, TransactionError> {
        let encoded = assign_group(self.composer, &mut transactions)?;
        log_debug!(
            "tx.arc59",
            "composed inbox group",
            size = encoded.len(),
            asset_id = self.draft.asset_id,
        );
        Ok(transactions
            .iter()
            .zip(encoded)
            .map(|(transaction, bytes)| encode_item_bytes(transaction, bytes))
            .collect())
    }
}

impl<C: TransactionComposer + ?Sized> TransactionDataBuildable for Arc59TransactionDataBuilder<'_, C> {
    fn compose_data(&self) -> Result<Vec<TransactionDataItem>, TransactionError> {
        let mut items = Vec::new();
        if !self.draft.is_opted_in_to_protocol {
            items.extend(self.compose_opt_in_to_protocol_transaction_data()?);
        }
        items.extend(self.compose_send_transaction_data()?);
        Ok(items)
    }
}
