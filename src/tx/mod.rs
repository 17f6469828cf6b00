//! Transaction Module
//!
//! Composes transactions from send drafts and signs batches of them.

pub mod amount;
pub mod arc59;
pub mod batch;
pub mod builder;
pub mod draft;
pub mod fee;
pub mod params;
pub mod signer;
pub mod transaction;

pub use amount::{AmountCalculation, TransactionAmountCalculator};
pub use arc59::Arc59TransactionDataBuilder;
pub use batch::{
    BatchRejection, BatchTransactionSigner, HardwareSignRequest, HardwareSigner, LedgerError,
    SigningFailure, SigningSession, SigningState, WcErrorReason, WcTransactionErrorResponse,
};
pub use builder::{
    AssetTransactionDataBuilder, KeyRegTransactionDataBuilder, PaymentTransactionDataBuilder,
    TransactionDataBuildable, TransactionDataBuilder, TransactionDataItem, TransactionError,
};
pub use draft::{
    AlgosTransactionSendDraft, Arc59TransactionSendDraft, AssetTransactionSendDraft, Destination,
    KeyRegTransactionSendDraft, TransactionSendDraft,
};
pub use fee::{calculate_minimum_amount, AccountState, AssetHolding, FeeTransactionKind};
pub use params::{NetworkParameterProvider, TransactionParams};
pub use signer::{LocalTransactionSigner, SigningError};
pub use transaction::{CanonicalComposer, SignedTransaction, Transaction, TransactionComposer};
