//! Algorand HD Wallet Core
//!
//! Key derivation and transaction composition/signing engine for an
//! Algorand wallet.
//!
//! # Architecture
//!
//! - **crypto**: BIP32-Ed25519 key derivation port, address codec
//! - **wallet**: wallet model, key storage, address derivation, recovery,
//!   signer resolution
//! - **tx**: fee and amount rules, transaction builders, local and batch signing
//! - **ffi**: C-ABI exports for the mobile app
//!
//! # FFI Usage
//!
//! All FFI functions take and return JSON strings. Returned strings must be
//! freed with `algo_hd_free_string`.
//!
//! # Security
//!
//! Entropy, seeds and private keys live in zeroizing buffers and are only
//! materialised for the duration of a single derive or sign call.
//!
//! # Example
//!
//! ```rust,ignore
//! use algo_hd_core::crypto::XhdKeyDerivation;
//! use algo_hd_core::wallet::{HdAddressDeriver, PendingAccountCreation};
//!
//! let deriver = HdAddressDeriver::new(XhdKeyDerivation::new());
//! let mut pending = PendingAccountCreation::generate("Main")?;
//! println!("first address: {}", pending.first_address(&deriver)?.address);
//! ```

pub mod crypto;
pub mod error;
pub mod ffi;
pub mod security;
pub mod serde_bytes;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

pub use error::{CoreError, CoreResult, ErrorCode};
pub use types::*;

pub use crypto::{KeyDerivationPort, XhdKeyDerivation};
pub use tx::{BatchTransactionSigner, TransactionAmountCalculator, TransactionDataBuilder};
pub use utils::{AlgorandNetwork, CoreConfig};
pub use wallet::{AccountAuthorizationResolver, HdAddressDeriver, SignerPath, WalletKeyStore};

pub use ffi::{
    algo_hd_calculate_amount, algo_hd_compose_transactions, algo_hd_derivation_path,
    algo_hd_free_string, algo_hd_resolve_signer, algo_hd_validate_address,
};
