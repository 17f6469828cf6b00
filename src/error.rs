//! Unified error types for the HD wallet core
//!
//! Module-level failures are typed enums (`SdkError`, `DerivationError`,
//! `StorageError`, `TransactionError`, `SigningError`). They all fold into
//! `CoreError` at the FFI and CLI boundary for consistent reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::port::SdkError;
use crate::tx::batch::BatchRejection;
use crate::tx::builder::TransactionError;
use crate::tx::signer::SigningError;
use crate::wallet::derivation::DerivationError;
use crate::wallet::derivation_path::PathError;
use crate::wallet::keystore::StorageError;
use crate::wallet::model::AccountError;

/// Main error type surfaced across the crate boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for CoreError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    InvalidAddress,
    InvalidMnemonic,
    InvalidTransaction,

    // Key material
    DerivationFailed,
    StorageError,
    CryptoError,

    // Signing
    SigningFailed,
    SigningRejected,
    HardwareError,

    // Parse errors
    JsonError,
    HexError,

    Internal,
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

// Conversions from module error types

impl From<SdkError> for CoreError {
    fn from(e: SdkError) -> Self {
        CoreError::new(ErrorCode::CryptoError, e.to_string())
    }
}

impl From<DerivationError> for CoreError {
    fn from(e: DerivationError) -> Self {
        CoreError::new(ErrorCode::DerivationFailed, e.to_string())
    }
}

impl From<PathError> for CoreError {
    fn from(e: PathError) -> Self {
        CoreError::invalid_input(e.to_string())
    }
}

impl From<AccountError> for CoreError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::InvalidAddress(_) => CoreError::invalid_address(e.to_string()),
            other => CoreError::invalid_input(other.to_string()),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        CoreError::new(ErrorCode::StorageError, e.to_string())
    }
}

impl From<TransactionError> for CoreError {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::Other(reason) => CoreError::new(ErrorCode::InvalidTransaction, reason),
            TransactionError::SdkError(inner) => {
                CoreError::new(ErrorCode::CryptoError, "transaction composition failed")
                    .with_details(inner.to_string())
            }
        }
    }
}

impl From<SigningError> for CoreError {
    fn from(e: SigningError) -> Self {
        match e {
            SigningError::Ledger(ledger) => {
                CoreError::new(ErrorCode::HardwareError, ledger.to_string())
                    .with_details(ledger.guidance())
            }
            other => CoreError::new(ErrorCode::SigningFailed, other.to_string()),
        }
    }
}

impl From<BatchRejection> for CoreError {
    fn from(e: BatchRejection) -> Self {
        CoreError::new(ErrorCode::SigningRejected, e.response.to_string())
            .with_details(e.reason.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for CoreError {
    fn from(e: hex::FromHexError) -> Self {
        CoreError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<bip39::Error> for CoreError {
    fn from(e: bip39::Error) -> Self {
        CoreError::new(ErrorCode::InvalidMnemonic, format!("BIP39 error: {}", e))
    }
}
