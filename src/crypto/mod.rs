//! Cryptographic building blocks
//!
//! - `port`: the `KeyDerivationPort` interface and its request types
//! - `xhd`: BIP32-Ed25519 implementation of the port
//! - `address`: Algorand address encoding and validation

pub mod address;
pub mod port;
pub mod xhd;

pub use address::{decode_address, encode_address, is_valid_address, AddressError};
pub use port::{
    DerivationType, KeyContext, KeyCoordinate, KeyDerivationPort, SdkError, SdkResult,
    SignMetadata,
};
pub use xhd::XhdKeyDerivation;
