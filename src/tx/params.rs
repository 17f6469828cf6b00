//! Suggested network parameters and fee projection

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::MicroAlgos;

/// Rounds a transaction stays valid after the last known round
pub const VALIDITY_WINDOW: u64 = 1_000;

/// Suggested parameters as returned by the node (`/v2/transactions/params`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionParams {
    /// Fee per byte
    pub fee: MicroAlgos,
    pub min_fee: MicroAlgos,
    pub last_round: u64,
    pub genesis_id: String,
    #[serde(with = "crate::serde_bytes::b64")]
    pub genesis_hash: Vec<u8>,
}

impl TransactionParams {
    /// Fee expected for a transaction of `size_hint` bytes.
    /// Without a size the network minimum is used.
    pub fn projected_fee(&self, size_hint: Option<usize>) -> MicroAlgos {
        match size_hint {
            Some(size) => {
                let by_size = self.fee.saturating_mul(size as u64);
                by_size.max(self.min_fee)
            }
            None => self.min_fee,
        }
    }

    pub fn first_valid(&self) -> u64 {
        self.last_round
    }

    pub fn last_valid(&self) -> u64 {
        self.last_round.saturating_add(VALIDITY_WINDOW)
    }
}

/// Source of suggested parameters (node API client)
#[async_trait]
pub trait NetworkParameterProvider: Send + Sync {
    async fn fetch_transaction_params(&self) -> Result<TransactionParams, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TransactionParams {
        TransactionParams {
            fee: 0,
            min_fee: 1_000,
            last_round: 40_000_000,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: vec![9u8; 32],
        }
    }

    #[test]
    fn test_projected_fee() {
        let mut params = params();
        assert_eq!(params.projected_fee(None), 1_000);
        assert_eq!(params.projected_fee(Some(250)), 1_000);

        params.fee = 10;
        assert_eq!(params.projected_fee(Some(250)), 2_500);
        assert_eq!(params.projected_fee(Some(50)), 1_000);
    }

    #[test]
    fn test_validity_window() {
        let params = params();
        assert_eq!(params.first_valid(), 40_000_000);
        assert_eq!(params.last_valid(), 40_001_000);
    }

    #[test]
    fn test_node_json() {
        let json = r#"{"fee":0,"min-fee":1000,"last-round":5,"genesis-id":"mainnet-v1.0","genesis-hash":"CQkJCQ=="}"#;
        let params: TransactionParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.min_fee, 1000);
        assert_eq!(params.genesis_hash, vec![9u8; 4]);
    }
}
