//! Transaction Model and Composer
//!
//! Ready-to-sign transactions are opaque bytes produced by a
//! `TransactionComposer`. The bundled composer uses a deterministic JSON
//! encoding; identifiers and group ids hash those bytes with a domain prefix.

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

use crate::crypto::port::{SdkError, SdkResult};
use crate::serde_bytes::{b64, b64_option, b64_vec};
use crate::types::{Address, MicroAlgos};

/// Domain prefix for signing and transaction ids
pub const TX_PREFIX: &[u8] = b"TX";
/// Domain prefix for group ids
pub const GROUP_PREFIX: &[u8] = b"TG";
/// Largest atomic group the network accepts
pub const MAX_GROUP_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFields {
    pub receiver: Address,
    pub amount: MicroAlgos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_remainder_to: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransferFields {
    pub asset_id: u64,
    pub amount: u64,
    pub receiver: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_to: Option<Address>,
}

/// All participation fields `None` means an offline registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegFields {
    #[serde(default, with = "b64_option", skip_serializing_if = "Option::is_none")]
    pub vote_key: Option<Vec<u8>>,
    #[serde(default, with = "b64_option", skip_serializing_if = "Option::is_none")]
    pub selection_key: Option<Vec<u8>>,
    #[serde(default, with = "b64_option", skip_serializing_if = "Option::is_none")]
    pub state_proof_key: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_first: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_last: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_key_dilution: Option<u64>,
}

impl KeyRegFields {
    pub fn is_online(&self) -> bool {
        self.vote_key.is_some()
            && self.selection_key.is_some()
            && self.vote_first.is_some()
            && self.vote_last.is_some()
            && self.vote_key_dilution.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxReference {
    pub app_index: u64,
    #[serde(with = "b64")]
    pub name: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCallFields {
    pub app_id: u64,
    #[serde(with = "b64_vec")]
    pub app_args: Vec<Vec<u8>>,
    #[serde(default)]
    pub accounts: Vec<Address>,
    #[serde(default)]
    pub foreign_assets: Vec<u64>,
    #[serde(default)]
    pub foreign_apps: Vec<u64>,
    #[serde(default)]
    pub boxes: Vec<BoxReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionBody {
    Pay(PaymentFields),
    Axfer(AssetTransferFields),
    Keyreg(KeyRegFields),
    Appl(AppCallFields),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub fee: MicroAlgos,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    #[serde(with = "b64")]
    pub genesis_hash: Vec<u8>,
    #[serde(default, with = "b64_option", skip_serializing_if = "Option::is_none")]
    pub note: Option<Vec<u8>>,
    #[serde(default, with = "b64_option", skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<u8>>,
    #[serde(flatten)]
    pub body: TransactionBody,
}

/// Transaction plus signature, ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(with = "b64")]
    pub sig: Vec<u8>,
    pub txn: Transaction,
    /// Authorizing address when it differs from the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgnr: Option<Address>,
}

/// Encodes transactions to and from their byte form
pub trait TransactionComposer: Send + Sync {
    fn encode(&self, transaction: &Transaction) -> SdkResult<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> SdkResult<Transaction>;

    fn encode_signed(&self, signed: &SignedTransaction) -> SdkResult<Vec<u8>>;

    fn decode_signed(&self, bytes: &[u8]) -> SdkResult<SignedTransaction>;
}

/// Deterministic JSON encoding (field order fixed by the type definitions)
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalComposer;

impl TransactionComposer for CanonicalComposer {
    fn encode(&self, transaction: &Transaction) -> SdkResult<Vec<u8>> {
        serde_json::to_vec(transaction).map_err(|e| SdkError::Compose(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> SdkResult<Transaction> {
        serde_json::from_slice(bytes).map_err(|e| SdkError::Compose(e.to_string()))
    }

    fn encode_signed(&self, signed: &SignedTransaction) -> SdkResult<Vec<u8>> {
        serde_json::to_vec(signed).map_err(|e| SdkError::Compose(e.to_string()))
    }

    fn decode_signed(&self, bytes: &[u8]) -> SdkResult<SignedTransaction> {
        serde_json::from_slice(bytes).map_err(|e| SdkError::Compose(e.to_string()))
    }
}

/// Bytes a signer signs: `"TX" || encoded`
pub fn bytes_to_sign(encoded: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(TX_PREFIX.len() + encoded.len());
    message.extend_from_slice(TX_PREFIX);
    message.extend_from_slice(encoded);
    message
}

fn raw_transaction_hash(encoded: &[u8]) -> [u8; 32] {
    Sha512_256::digest(bytes_to_sign(encoded)).into()
}

pub fn transaction_id(encoded: &[u8]) -> String {
    BASE32_NOPAD.encode(&raw_transaction_hash(encoded))
}

/// Group id over already-encoded, ungrouped transactions
pub fn compute_group_id(encoded: &[Vec<u8>]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(GROUP_PREFIX);
    for transaction in encoded {
        hasher.update(raw_transaction_hash(transaction));
    }
    hasher.finalize().into()
}

/// Give every transaction the shared group id and return their encodings
pub fn assign_group<C: TransactionComposer + ?Sized>(
    composer: &C,
    transactions: &mut [Transaction],
) -> SdkResult<Vec<Vec<u8>>> {
    if transactions.len() > MAX_GROUP_SIZE {
        return Err(SdkError::Compose(format!(
            "group of {} exceeds {} transactions",
            transactions.len(),
            MAX_GROUP_SIZE
        )));
    }
    let ungrouped = transactions
        .iter_mut()
        .map(|transaction| {
            transaction.group = None;
            composer.encode(transaction)
        })
        .collect::<SdkResult<Vec<_>>>()?;

    let group = compute_group_id(&ungrouped).to_vec();
    transactions
        .iter_mut()
        .map(|transaction| {
            transaction.group = Some(group.clone());
            composer.encode(transaction)
        })
        .collect()
}

/// Combine unsigned bytes with a 64-byte signature
pub fn attach_signature<C: TransactionComposer + ?Sized>(
    composer: &C,
    unsigned: &[u8],
    signature: &[u8],
    signer: Option<&str>,
) -> SdkResult<Vec<u8>> {
    if signature.len() != 64 {
        return Err(SdkError::Compose(format!(
            "signature must be 64 bytes, got {}",
            signature.len()
        )));
    }
    let txn = composer.decode(unsigned)?;
    let sgnr = signer
        .filter(|signer| *signer != txn.sender)
        .map(str::to_string);
    composer.encode_signed(&SignedTransaction {
        sig: signature.to_vec(),
        txn,
        sgnr,
    })
}
