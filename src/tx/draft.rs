//! Transaction send drafts
//!
//! User intent before composition. Amounts are signed so that invalid
//! negative input can be rejected instead of wrapping.

use serde::{Deserialize, Serialize};

use super::fee::AccountState;
use crate::types::{Address, MicroAlgos};

/// Where a send goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Account { address: Address },
    Contact { name: String, address: Address },
    NameService { name: String, address: Address },
}

impl Destination {
    pub fn address(&self) -> &str {
        match self {
            Destination::Account { address }
            | Destination::Contact { address, .. }
            | Destination::NameService { address, .. } => address.trim(),
        }
    }
}

/// Note precedence: a locked note always wins
fn effective_note(locked_note: &Option<String>, note: &Option<String>) -> Option<Vec<u8>> {
    locked_note
        .as_ref()
        .or(note.as_ref())
        .filter(|note| !note.is_empty())
        .map(|note| note.as_bytes().to_vec())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgosTransactionSendDraft {
    pub from: AccountState,
    #[serde(default)]
    pub to: Option<Destination>,
    /// MicroAlgos
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub fee: Option<MicroAlgos>,
    #[serde(default)]
    pub is_max_transaction: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub locked_note: Option<String>,
}

impl AlgosTransactionSendDraft {
    pub fn new(from: AccountState) -> Self {
        Self {
            from,
            to: None,
            amount: None,
            fee: None,
            is_max_transaction: false,
            note: None,
            locked_note: None,
        }
    }

    pub fn is_max_transaction_from_rekeyed_account(&self) -> bool {
        self.is_max_transaction && self.from.is_rekeyed()
    }

    pub fn note_bytes(&self) -> Option<Vec<u8>> {
        effective_note(&self.locked_note, &self.note)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransactionSendDraft {
    pub from: AccountState,
    #[serde(default)]
    pub to: Option<Destination>,
    #[serde(default)]
    pub asset_id: Option<u64>,
    /// Base units of the asset
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub is_max_transaction: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub locked_note: Option<String>,
}

impl AssetTransactionSendDraft {
    pub fn note_bytes(&self) -> Option<Vec<u8>> {
        effective_note(&self.locked_note, &self.note)
    }
}

/// Asset send routed through the ARC-59 inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc59TransactionSendDraft {
    pub from: AccountState,
    pub receiver: Address,
    pub app_id: u64,
    pub app_address: Address,
    pub inbox_account: Option<Address>,
    pub min_balance: MicroAlgos,
    pub inner_transaction_count: u64,
    pub extra_algo_amount: MicroAlgos,
    pub asset_id: u64,
    pub amount: u64,
    /// Router already opted into the asset
    #[serde(default)]
    pub is_opted_in_to_protocol: bool,
}

/// Participation key registration; any missing field means "go offline"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegTransactionSendDraft {
    pub from: Address,
    /// Base64 participation keys
    #[serde(default)]
    pub vote_key: Option<String>,
    #[serde(default)]
    pub selection_key: Option<String>,
    #[serde(default)]
    pub state_proof_key: Option<String>,
    #[serde(default)]
    pub vote_first: Option<u64>,
    #[serde(default)]
    pub vote_last: Option<u64>,
    #[serde(default)]
    pub vote_key_dilution: Option<u64>,
    #[serde(default)]
    pub fee: Option<MicroAlgos>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Closed set of send intents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionSendDraft {
    Algos(AlgosTransactionSendDraft),
    Asset(AssetTransactionSendDraft),
    Arc59(Arc59TransactionSendDraft),
    KeyReg(KeyRegTransactionSendDraft),
}

impl TransactionSendDraft {
    pub fn sender(&self) -> &str {
        match self {
            TransactionSendDraft::Algos(draft) => &draft.from.address,
            TransactionSendDraft::Asset(draft) => &draft.from.address,
            TransactionSendDraft::Arc59(draft) => &draft.from.address,
            TransactionSendDraft::KeyReg(draft) => &draft.from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_note_wins() {
        let mut draft = AlgosTransactionSendDraft::new(AccountState::new("A", 0));
        draft.note = Some("user".into());
        assert_eq!(draft.note_bytes(), Some(b"user".to_vec()));
        draft.locked_note = Some("exchange memo".into());
        assert_eq!(draft.note_bytes(), Some(b"exchange memo".to_vec()));
        draft.locked_note = Some(String::new());
        assert_eq!(draft.note_bytes(), None);
    }

    #[test]
    fn test_destination_address_is_trimmed() {
        let destination = Destination::Contact { name: "Bob".into(), address: " ADDR \n".into() };
        assert_eq!(destination.address(), "ADDR");
    }

    #[test]
    fn test_draft_json_tag() {
        let draft = TransactionSendDraft::KeyReg(KeyRegTransactionSendDraft {
            from: "SENDER".into(),
            ..Default::default()
        });
        let json = serde_json::to_string(&draft).unwrap();
        assert!(json.starts_with("{\"type\":\"key_reg\""));
        assert_eq!(draft.sender(), "SENDER");
    }
}
