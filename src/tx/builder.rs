//! Transaction Data Builders
//!
//! Turn a send draft into ready-to-sign transaction bytes. Validation
//! failures never produce a partial result.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::amount::{AmountCalculation, TransactionAmountCalculator};
use super::arc59::Arc59TransactionDataBuilder;
use super::draft::{
    AlgosTransactionSendDraft, AssetTransactionSendDraft, Destination, KeyRegTransactionSendDraft,
    TransactionSendDraft,
};
use super::fee::{is_valid_transaction_amount, FeeTransactionKind};
use super::params::TransactionParams;
use super::transaction::{
    transaction_id, AssetTransferFields, KeyRegFields, PaymentFields, Transaction, TransactionBody,
    TransactionComposer,
};
use crate::crypto::address::is_valid_address;
use crate::crypto::port::SdkError;
use crate::log_debug;
use crate::types::{Address, MicroAlgos};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("{0}")]
    Other(String),
    #[error("transaction composition failed: {0}")]
    SdkError(#[from] SdkError),
}

impl TransactionError {
    fn other(reason: impl Into<String>) -> Self {
        TransactionError::Other(reason.into())
    }
}

/// One ready-to-sign transaction and its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDataItem {
    pub sender: Address,
    #[serde(with = "crate::serde_bytes::b64")]
    pub transaction: Vec<u8>,
}

pub trait TransactionDataBuildable {
    fn compose_data(&self) -> Result<Vec<TransactionDataItem>, TransactionError>;
}

/// Common header for every transaction built here
pub(crate) fn envelope(
    sender: &str,
    fee: MicroAlgos,
    params: &TransactionParams,
    note: Option<Vec<u8>>,
    body: TransactionBody,
) -> Transaction {
    Transaction {
        sender: sender.to_string(),
        fee,
        first_valid: params.first_valid(),
        last_valid: params.last_valid(),
        genesis_id: params.genesis_id.clone(),
        genesis_hash: params.genesis_hash.clone(),
        note,
        group: None,
        body,
    }
}

pub(crate) fn encode_item<C: TransactionComposer + ?Sized>(
    composer: &C,
    transaction: &Transaction,
) -> Result<TransactionDataItem, TransactionError> {
    let bytes = composer.encode(transaction)?;
    Ok(encode_item_bytes(transaction, bytes))
}

/// Pair already-encoded bytes with their sender
pub(crate) fn encode_item_bytes(transaction: &Transaction, bytes: Vec<u8>) -> TransactionDataItem {
    log_debug!(
        "tx.builder",
        "composed transaction",
        sender = transaction.sender,
        txid = transaction_id(&bytes),
    );
    TransactionDataItem {
        sender: transaction.sender.clone(),
        transaction: bytes,
    }
}

fn receiver(destination: &Option<Destination>) -> Result<&str, TransactionError> {
    let address = destination
        .as_ref()
        .map(Destination::address)
        .ok_or_else(|| TransactionError::other("missing receiver"))?;
    if !is_valid_address(address) {
        return Err(TransactionError::other(format!("invalid receiver address: {}", address)));
    }
    Ok(address)
}

fn check_sender(address: &str) -> Result<(), TransactionError> {
    if !is_valid_address(address) {
        return Err(TransactionError::other(format!("invalid sender address: {}", address)));
    }
    Ok(())
}

// =============================================================================
// Payment
// =============================================================================

pub struct PaymentTransactionDataBuilder<'a, C: ?Sized> {
    params: &'a TransactionParams,
    draft: &'a AlgosTransactionSendDraft,
    initial_size: Option<usize>,
    composer: &'a C,
}

impl<'a, C: TransactionComposer + ?Sized> PaymentTransactionDataBuilder<'a, C> {
    pub fn new(
        params: &'a TransactionParams,
        draft: &'a AlgosTransactionSendDraft,
        initial_size: Option<usize>,
        composer: &'a C,
    ) -> Self {
        Self { params, draft, initial_size, composer }
    }

    /// Compose and report the amount figures used
    pub fn compose_with_amount(
        &self,
    ) -> Result<(Vec<TransactionDataItem>, AmountCalculation), TransactionError> {
        let receiver = receiver(&self.draft.to)?;
        check_sender(&self.draft.from.address)?;
        if self.draft.amount.is_some_and(|amount| amount < 0) {
            return Err(TransactionError::other("amount must not be negative"));
        }

        let calculation =
            TransactionAmountCalculator::new(self.params, self.initial_size).calculate(self.draft);

        let body = TransactionBody::Pay(PaymentFields {
            receiver: receiver.to_string(),
            amount: calculation.amount,
            close_remainder_to: calculation.is_max_transaction.then(|| receiver.to_string()),
        });
        let transaction = envelope(
            &self.draft.from.address,
            calculation.fee,
            self.params,
            self.draft.note_bytes(),
            body,
        );
        Ok((vec![encode_item(self.composer, &transaction)?], calculation))
    }
}

impl<C: TransactionComposer + ?Sized> TransactionDataBuildable for PaymentTransactionDataBuilder<'_, C> {
    fn compose_data(&self) -> Result<Vec<TransactionDataItem>, TransactionError> {
        self.compose_with_amount().map(|(items, _)| items)
    }
}

// =============================================================================
// Asset transfer
// =============================================================================

pub struct AssetTransactionDataBuilder<'a, C: ?Sized> {
    params: &'a TransactionParams,
    draft: &'a AssetTransactionSendDraft,
    initial_size: Option<usize>,
    composer: &'a C,
}

impl<'a, C: TransactionComposer + ?Sized> AssetTransactionDataBuilder<'a, C> {
    pub fn new(
        params: &'a TransactionParams,
        draft: &'a AssetTransactionSendDraft,
        initial_size: Option<usize>,
        composer: &'a C,
    ) -> Self {
        Self { params, draft, initial_size, composer }
    }
}

impl<C: TransactionComposer + ?Sized> TransactionDataBuildable for AssetTransactionDataBuilder<'_, C> {
    fn compose_data(&self) -> Result<Vec<TransactionDataItem>, TransactionError> {
        let draft = self.draft;
        let receiver = receiver(&draft.to)?;
        check_sender(&draft.from.address)?;
        let asset_id = draft
            .asset_id
            .ok_or_else(|| TransactionError::other("missing asset id"))?;
        let holding = draft
            .from
            .holding(asset_id)
            .ok_or_else(|| TransactionError::other(format!("sender does not hold asset {}", asset_id)))?;

        let amount = if draft.is_max_transaction {
            holding.amount
        } else {
            let requested = draft.amount.unwrap_or(0);
            u64::try_from(requested)
                .map_err(|_| TransactionError::other("amount must not be negative"))?
        };
        if amount > holding.amount {
            return Err(TransactionError::other("amount exceeds asset balance"));
        }

        let fee = self.params.projected_fee(self.initial_size);
        if !is_valid_transaction_amount(&draft.from, FeeTransactionKind::Asset, fee) {
            return Err(TransactionError::other("balance does not cover the fee and minimum balance"));
        }

        let body = TransactionBody::Axfer(AssetTransferFields {
            asset_id,
            amount,
            receiver: receiver.to_string(),
            close_to: None,
        });
        let transaction = envelope(&draft.from.address, fee, self.params, draft.note_bytes(), body);
        Ok(vec![encode_item(self.composer, &transaction)?])
    }
}

// =============================================================================
// Key registration
// =============================================================================

pub struct KeyRegTransactionDataBuilder<'a, C: ?Sized> {
    params: &'a TransactionParams,
    draft: &'a KeyRegTransactionSendDraft,
    initial_size: Option<usize>,
    composer: &'a C,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|value| !value.trim().is_empty())
}

fn decode_key(name: &str, value: &Option<String>) -> Result<Option<Vec<u8>>, TransactionError> {
    match value.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(encoded) => STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| TransactionError::other(format!("invalid {}: {}", name, e))),
        None => Ok(None),
    }
}

impl<'a, C: TransactionComposer + ?Sized> KeyRegTransactionDataBuilder<'a, C> {
    pub fn new(
        params: &'a TransactionParams,
        draft: &'a KeyRegTransactionSendDraft,
        initial_size: Option<usize>,
        composer: &'a C,
    ) -> Self {
        Self { params, draft, initial_size, composer }
    }

    /// Online only when every participation field is supplied
    pub fn is_online(&self) -> bool {
        let draft = self.draft;
        present(&draft.vote_key)
            && present(&draft.selection_key)
            && draft.vote_first.is_some()
            && draft.vote_last.is_some()
            && draft.vote_key_dilution.is_some()
    }

    fn fields(&self) -> Result<KeyRegFields, TransactionError> {
        if !self.is_online() {
            return Ok(KeyRegFields::default());
        }
        let draft = self.draft;
        Ok(KeyRegFields {
            vote_key: decode_key("vote key", &draft.vote_key)?,
            selection_key: decode_key("selection key", &draft.selection_key)?,
            state_proof_key: decode_key("state proof key", &draft.state_proof_key)?,
            vote_first: draft.vote_first,
            vote_last: draft.vote_last,
            vote_key_dilution: draft.vote_key_dilution,
        })
    }
}

impl<C: TransactionComposer + ?Sized> TransactionDataBuildable for KeyRegTransactionDataBuilder<'_, C> {
    fn compose_data(&self) -> Result<Vec<TransactionDataItem>, TransactionError> {
        check_sender(&self.draft.from)?;
        let fields = self.fields()?;
        let fee = self
            .draft
            .fee
            .unwrap_or_else(|| self.params.projected_fee(self.initial_size));
        let note = self
            .draft
            .note
            .as_ref()
            .filter(|note| !note.is_empty())
            .map(|note| note.as_bytes().to_vec());

        let transaction = envelope(&self.draft.from, fee, self.params, note, TransactionBody::Keyreg(fields));
        Ok(vec![encode_item(self.composer, &transaction)?])
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Builds any draft variant
pub struct TransactionDataBuilder<'a, C: ?Sized> {
    params: &'a TransactionParams,
    initial_size: Option<usize>,
    composer: &'a C,
}

impl<'a, C: TransactionComposer + ?Sized> TransactionDataBuilder<'a, C> {
    pub fn new(params: &'a TransactionParams, initial_size: Option<usize>, composer: &'a C) -> Self {
        Self { params, initial_size, composer }
    }

    /// ARC-59 sends yield the router opt-in group (when needed) followed by the send group
    pub fn compose(&self, draft: &TransactionSendDraft) -> Result<Vec<TransactionDataItem>, TransactionError> {
        match draft {
            TransactionSendDraft::Algos(draft) => {
                PaymentTransactionDataBuilder::new(self.params, draft, self.initial_size, self.composer)
                    .compose_data()
            }
            TransactionSendDraft::Asset(draft) => {
                AssetTransactionDataBuilder::new(self.params, draft, self.initial_size, self.composer)
                    .compose_data()
            }
            TransactionSendDraft::Arc59(draft) => {
                Arc59TransactionDataBuilder::new(self.params, draft, self.composer).compose_data()
            }
            TransactionSendDraft::KeyReg(draft) => {
                KeyRegTransactionDataBuilder::new(self.params, draft, self.initial_size, self.composer)
                    .compose_data()
            }
        }
    }
}
