//! Batch Transaction Signer
//!
//! Signs an ordered list of transactions, each with whatever signer its
//! sender resolves to. Signers are resolved once, before anything is
//! signed. Items nobody can sign keep a `None` slot so the output lines up
//! with the input. Any failure rejects the whole batch and discards the
//! signatures gathered so far.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use super::builder::TransactionDataItem;
use super::signer::{LocalTransactionSigner, SigningError};
use super::transaction::{attach_signature, bytes_to_sign, TransactionComposer};
use crate::crypto::port::KeyDerivationPort;
use crate::types::Address;
use crate::wallet::authorization::{AccountAuthorizationResolver, SignerPath};
use crate::wallet::keystore::WalletKeyStore;
use crate::wallet::model::LedgerDetail;
use crate::{log_info, log_warn};

/// How long a hardware device may take to answer one request
pub const DEFAULT_HARDWARE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Errors
// =============================================================================

/// Failures reported by a hardware signer
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerError {
    #[error("could not connect to the hardware device")]
    Connection,
    #[error("could not read the account from the device")]
    FailedToFetchAddress,
    #[error("signing was cancelled on the device")]
    Cancelled,
    #[error("the Algorand app is not open on the device")]
    ClosedApp,
    #[error("the device could not sign the transaction")]
    FailedToSign,
    #[error("device account {actual} does not match {expected}")]
    UnmatchedAddress { expected: Address, actual: Address },
    #[error("hardware error: {0}")]
    Unknown(String),
}

impl LedgerError {
    /// What the user should do next
    pub fn guidance(&self) -> &'static str {
        match self {
            LedgerError::Connection => "Make sure the device is unlocked and Bluetooth is enabled.",
            LedgerError::FailedToFetchAddress => "Reconnect the device and try again.",
            LedgerError::Cancelled => "The request was declined on the device.",
            LedgerError::ClosedApp => "Open the Algorand app on the device.",
            LedgerError::FailedToSign => "Check the device screen and try again.",
            LedgerError::UnmatchedAddress { .. } => {
                "The connected device does not hold this account's key. Connect the right device."
            }
            LedgerError::Unknown(_) => "Disconnect and reconnect the device.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WcErrorReason {
    User,
    Unsignable,
}

impl fmt::Display for WcErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WcErrorReason::User => write!(f, "rejected by user"),
            WcErrorReason::Unsignable => write!(f, "transaction cannot be signed"),
        }
    }
}

/// Response returned to the requesting dApp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum WcTransactionErrorResponse {
    #[error("request rejected: {0}")]
    Rejected(WcErrorReason),
    #[error("invalid input: {0}")]
    InvalidInput(WcErrorReason),
}

impl WcTransactionErrorResponse {
    /// ARC-25 provider error code
    pub fn code(&self) -> u32 {
        match self {
            WcTransactionErrorResponse::Rejected(_) => 4001,
            WcTransactionErrorResponse::InvalidInput(_) => 4300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{response} ({reason})")]
pub struct BatchRejection {
    pub response: WcTransactionErrorResponse,
    pub reason: String,
}

/// Why signing a single transaction failed
#[derive(Debug)]
pub enum SigningFailure {
    UserCancelled,
    Ledger(LedgerError),
    Local(SigningError),
}

impl SigningFailure {
    fn rejection(self) -> BatchRejection {
        let (response, reason) = match self {
            SigningFailure::UserCancelled => (
                WcTransactionErrorResponse::Rejected(WcErrorReason::User),
                "cancelled by user".to_string(),
            ),
            SigningFailure::Ledger(LedgerError::Cancelled) => (
                WcTransactionErrorResponse::Rejected(WcErrorReason::User),
                LedgerError::Cancelled.to_string(),
            ),
            SigningFailure::Ledger(error) => (
                WcTransactionErrorResponse::Rejected(WcErrorReason::Unsignable),
                error.to_string(),
            ),
            SigningFailure::Local(SigningError::Ledger(LedgerError::Cancelled)) => (
                WcTransactionErrorResponse::Rejected(WcErrorReason::User),
                LedgerError::Cancelled.to_string(),
            ),
            SigningFailure::Local(error) => (
                WcTransactionErrorResponse::Rejected(WcErrorReason::Unsignable),
                error.to_string(),
            ),
        };
        BatchRejection { response, reason }
    }
}

fn invalid_input(reason: &str) -> BatchRejection {
    BatchRejection {
        response: WcTransactionErrorResponse::InvalidInput(WcErrorReason::Unsignable),
        reason: reason.to_string(),
    }
}

// =============================================================================
// State machine
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningState {
    Idle,
    SigningIndex(usize),
    Rejected(BatchRejection),
    Completed,
}

/// One batch signing run; drives the left-to-right signing order
#[derive(Debug)]
pub struct SigningSession {
    transactions: Vec<TransactionDataItem>,
    signers: Vec<Option<SignerPath>>,
    signed: Vec<Option<Vec<u8>>>,
    state: SigningState,
}

impl SigningSession {
    /// Resolves the signer of every transaction up front
    pub fn new(transactions: Vec<TransactionDataItem>, resolver: &AccountAuthorizationResolver<'_>) -> Self {
        let signers = transactions
            .iter()
            .map(|item| Some(resolver.resolve_address(&item.sender)).filter(SignerPath::is_signable))
            .collect();
        Self {
            signed: Vec::with_capacity(transactions.len()),
            transactions,
            signers,
            state: SigningState::Idle,
        }
    }

    pub fn state(&self) -> &SigningState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn signer(&self, index: usize) -> Option<&SignerPath> {
        self.signers.get(index).and_then(Option::as_ref)
    }

    /// Transaction awaiting a signature
    pub fn current(&self) -> Option<(usize, &TransactionDataItem, &SignerPath)> {
        match self.state {
            SigningState::SigningIndex(index) => {
                let signer = self.signer(index)?;
                Some((index, &self.transactions[index], signer))
            }
            _ => None,
        }
    }

    /// Start signing at the first transaction with a signer
    pub fn confirm_signing(&mut self) -> &SigningState {
        if self.state != SigningState::Idle {
            return &self.state;
        }
        match self.signers.iter().position(Option::is_some) {
            Some(_) => self.advance(0),
            None => self.reject(invalid_input("no transaction in the batch can be signed")),
        }
        &self.state
    }

    pub fn record_signature(&mut self, signed: Vec<u8>) -> &SigningState {
        if let SigningState::SigningIndex(index) = self.state {
            self.signed.push(Some(signed));
            self.advance(index + 1);
        }
        &self.state
    }

    pub fn fail(&mut self, failure: SigningFailure) -> &SigningState {
        if !matches!(self.state, SigningState::Completed | SigningState::Rejected(_)) {
            self.reject(failure.rejection());
        }
        &self.state
    }

    /// Skip unsignable items with a `None` slot until the next signable one
    fn advance(&mut self, mut next: usize) {
        while next < self.transactions.len() && self.signers[next].is_none() {
            self.signed.push(None);
            next += 1;
        }
        if next < self.transactions.len() {
            self.state = SigningState::SigningIndex(next);
        } else if self.signed.len() == self.transactions.len() {
            self.state = SigningState::Completed;
        } else {
            self.reject(invalid_input("signed transaction count does not match the batch"));
        }
    }

    fn reject(&mut self, rejection: BatchRejection) {
        self.signed.clear();
        self.state = SigningState::Rejected(rejection);
    }

    /// Ordered signed transactions, `None` where no signer was available
    pub fn into_result(self) -> Result<Vec<Option<Vec<u8>>>, BatchRejection> {
        match self.state {
            SigningState::Completed => Ok(self.signed),
            SigningState::Rejected(rejection) => Err(rejection),
            SigningState::Idle | SigningState::SigningIndex(_) => {
                Err(invalid_input("signing did not finish"))
            }
        }
    }
}

// =============================================================================
// Async driver
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareSignRequest {
    pub ledger_detail: LedgerDetail,
    pub signer_address: Address,
    /// `"TX" || transaction`
    pub message: Vec<u8>,
}

/// External signing device
#[async_trait]
pub trait HardwareSigner: Send + Sync {
    /// 64-byte Ed25519 signature over `request.message`
    async fn sign(&self, request: HardwareSignRequest) -> Result<Vec<u8>, LedgerError>;

    async fn disconnect(&self);
}

/// Resolves once the user rejects; never resolves if the sender is dropped
async fn user_rejection(cancel: &mut Option<oneshot::Receiver<()>>) {
    if let Some(receiver) = cancel.as_mut() {
        if receiver.await.is_ok() {
            return;
        }
        *cancel = None;
    }
    std::future::pending::<()>().await
}

fn rejected_already(cancel: &mut Option<oneshot::Receiver<()>>) -> bool {
    match cancel.as_mut().map(|receiver| receiver.try_recv()) {
        Some(Ok(())) => true,
        Some(Err(oneshot::error::TryRecvError::Closed)) => {
            *cancel = None;
            false
        }
        _ => false,
    }
}

pub struct BatchTransactionSigner<'a, P, S: ?Sized, C: ?Sized, H: ?Sized> {
    local: LocalTransactionSigner<'a, P, S, C>,
    composer: &'a C,
    hardware: Option<&'a H>,
    hardware_timeout: Duration,
}

impl<'a, P, S, C, H> BatchTransactionSigner<'a, P, S, C, H>
where
    P: KeyDerivationPort,
    S: WalletKeyStore + ?Sized,
    C: TransactionComposer + ?Sized,
    H: HardwareSigner + ?Sized,
{
    pub fn new(port: &'a P, store: &'a S, composer: &'a C, hardware: Option<&'a H>) -> Self {
        Self {
            local: LocalTransactionSigner::new(port, store, composer),
            composer,
            hardware,
            hardware_timeout: DEFAULT_HARDWARE_TIMEOUT,
        }
    }

    pub fn with_hardware_timeout(mut self, timeout: Duration) -> Self {
        self.hardware_timeout = timeout;
        self
    }

    /// Sign the whole batch or nothing. `cancel` fires when the user rejects
    /// the request while a signature is pending.
    pub async fn sign_all(
        &self,
        transactions: Vec<TransactionDataItem>,
        resolver: &AccountAuthorizationResolver<'_>,
        cancel: oneshot::Receiver<()>,
    ) -> Result<Vec<Option<Vec<u8>>>, BatchRejection> {
        let mut cancel = Some(cancel);
        let mut session = SigningSession::new(transactions, resolver);
        session.confirm_signing();
        let mut used_hardware = false;

        while let Some((index, item, path)) = session.current() {
            let unsigned = item.transaction.clone();
            let path = path.clone();

            let outcome = if rejected_already(&mut cancel) {
                Err(SigningFailure::UserCancelled)
            } else {
                match path {
                    SignerPath::Hardware { address, ledger_detail } => {
                        used_hardware = true;
                        let request = HardwareSignRequest {
                            ledger_detail,
                            signer_address: address,
                            message: bytes_to_sign(&unsigned),
                        };
                        tokio::select! {
                            biased;
                            _ = user_rejection(&mut cancel) => Err(SigningFailure::UserCancelled),
                            result = self.sign_with_hardware(&unsigned, request) => result,
                        }
                    }
                    local => self.local.sign(&local, &unsigned).map_err(SigningFailure::Local),
                }
            };

            match outcome {
                Ok(signed) => {
                    session.record_signature(signed);
                }
                Err(failure) => {
                    log_warn!("tx.batch", "batch signing failed", index = index);
                    session.fail(failure);
                }
            }
        }

        if used_hardware {
            if let Some(hardware) = self.hardware {
                hardware.disconnect().await;
            }
        }

        match session.state() {
            SigningState::Completed => {
                log_info!("tx.batch", "batch signed", transactions = session.len());
            }
            SigningState::Rejected(rejection) => {
                log_warn!("tx.batch", "batch rejected", reason = rejection);
            }
            _ => {}
        }
        session.into_result()
    }

    async fn sign_with_hardware(
        &self,
        unsigned: &[u8],
        request: HardwareSignRequest,
    ) -> Result<Vec<u8>, SigningFailure> {
        let hardware = self
            .hardware
            .ok_or(SigningFailure::Ledger(LedgerError::Connection))?;
        let signer = request.signer_address.clone();

        let signature = match tokio::time::timeout(self.hardware_timeout, hardware.sign(request)).await {
            Ok(Ok(signature)) => signature,
            Ok(Err(error)) => return Err(SigningFailure::Ledger(error)),
            Err(_) => return Err(SigningFailure::Ledger(LedgerError::Connection)),
        };

        attach_signature(self.composer, unsigned, &signature, Some(signer.as_str()))
            .map_err(|e| SigningFailure::Local(SigningError::from(e)))
    }
}
