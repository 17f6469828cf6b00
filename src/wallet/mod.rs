//! Wallet Module
//!
//! HD wallet model, secure key storage, address derivation, recovery and
//! signer resolution.

pub mod authorization;
pub mod creation;
pub mod derivation;
pub mod derivation_path;
pub mod encrypted_store;
pub mod keygen;
pub mod keystore;
pub mod model;
pub mod recovery;

pub use authorization::{AccountAuthorizationResolver, SignerPath};
pub use creation::PendingAccountCreation;
pub use derivation::{derivation_path, with_wallet_seed, DerivationError, DerivedAddress, HdAddressDeriver};
pub use derivation_path::{DerivationPath, PathError};
pub use encrypted_store::{EncryptedFileKeyStore, KdfParams};
pub use keystore::{HdWalletAddress, MemoryKeyStore, StorageError, WalletKeyStore};
pub use model::{AccountError, AccountInformation, AccountType, HdWalletAddressDetail, LedgerDetail, Wallet};
pub use recovery::{recover_accounts, AccountLookup, RecoveredAddress, RecoveryOptions};
