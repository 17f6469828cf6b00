//! Core Configuration
//!
//! Network selection and derivation defaults with:
//! - Per-network ARC-59 router application constants
//! - JSON file loading
//! - Environment variable overrides
//! - Validation

use crate::crypto::port::DerivationType;
use crate::error::{CoreError, CoreResult};
use crate::types::MicroAlgos;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of consecutive unused entries before recovery stops
pub const DEFAULT_GAP_LIMIT: u32 = 5;
/// Protocol minimum fee per transaction
pub const DEFAULT_MIN_FEE: MicroAlgos = 1_000;

pub const ENV_NETWORK: &str = "ALGO_HD_NETWORK";
pub const ENV_DERIVATION_TYPE: &str = "ALGO_HD_DERIVATION_TYPE";
pub const ENV_GAP_LIMIT: &str = "ALGO_HD_GAP_LIMIT";
pub const ENV_DEBUG: &str = "ALGO_HD_DEBUG";

/// Algorand network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorandNetwork {
    #[default]
    MainNet,
    TestNet,
}

impl AlgorandNetwork {
    pub fn arc59(self) -> Arc59AppConfig {
        match self {
            AlgorandNetwork::MainNet => Arc59AppConfig {
                app_id: 2_449_590_623,
                app_address: "EZRVNZFJGOUZC67FUMEC7ZMVP232TPICFTQCVZ6EQEIRRT3TIHSKZULRNI".to_string(),
            },
            AlgorandNetwork::TestNet => Arc59AppConfig {
                app_id: 643_020_148,
                app_address: "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ".to_string(),
            },
        }
    }

    pub fn genesis_id(self) -> &'static str {
        match self {
            AlgorandNetwork::MainNet => "mainnet-v1.0",
            AlgorandNetwork::TestNet => "testnet-v1.0",
        }
    }
}

impl std::str::FromStr for AlgorandNetwork {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(AlgorandNetwork::MainNet),
            "testnet" => Ok(AlgorandNetwork::TestNet),
            other => Err(CoreError::invalid_input(format!("unknown network: {}", other))),
        }
    }
}

/// ARC-59 asset inbox router application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc59AppConfig {
    pub app_id: u64,
    pub app_address: String,
}

/// Runtime configuration for the wallet core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub network: AlgorandNetwork,
    pub derivation_type: DerivationType,
    pub gap_limit: u32,
    pub min_fee: MicroAlgos,
    pub debug_logging: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            network: AlgorandNetwork::MainNet,
            derivation_type: DerivationType::Peikert,
            gap_limit: DEFAULT_GAP_LIMIT,
            min_fee: DEFAULT_MIN_FEE,
            debug_logging: false,
        }
    }
}

impl CoreConfig {
    /// Load from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: CoreConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ALGO_HD_*` environment variables
    pub fn from_env() -> CoreResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup(ENV_NETWORK) {
            self.network = network.parse()?;
        }
        if let Some(derivation) = lookup(ENV_DERIVATION_TYPE) {
            self.derivation_type = derivation.parse().map_err(CoreError::invalid_input)?;
        }
        if let Some(gap) = lookup(ENV_GAP_LIMIT) {
            self.gap_limit = gap
                .trim()
                .parse()
                .map_err(|_| CoreError::invalid_input(format!("invalid gap limit: {}", gap)))?;
        }
        if let Some(debug) = lookup(ENV_DEBUG) {
            self.debug_logging = matches!(debug.trim(), "1" | "true" | "yes");
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.gap_limit == 0 {
            return Err(CoreError::invalid_input("gap limit must be at least 1"));
        }
        if self.min_fee < DEFAULT_MIN_FEE {
            return Err(CoreError::invalid_input(format!(
                "min fee must be at least {} microAlgos",
                DEFAULT_MIN_FEE
            )));
        }
        Ok(())
    }

    /// Switch on debug logging when configured
    pub fn apply_logging(&self) {
        if self.debug_logging {
            crate::utils::logging::enable_debug();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address::is_valid_address;
    use std::collections::HashMap;

    #[test]
    fn test_arc59_constants() {
        let main = AlgorandNetwork::MainNet.arc59();
        assert_eq!(main.app_id, 2_449_590_623);
        assert!(is_valid_address(&main.app_address));

        let test = AlgorandNetwork::TestNet.arc59();
        assert_eq!(test.app_id, 643_020_148);
        assert!(is_valid_address(&test.app_address));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_NETWORK, "TestNet"),
            (ENV_DERIVATION_TYPE, "khovratovich"),
            (ENV_GAP_LIMIT, "20"),
            (ENV_DEBUG, "1"),
        ]
        .into_iter()
        .collect();

        let config = CoreConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.network, AlgorandNetwork::TestNet);
        assert_eq!(config.derivation_type, DerivationType::Khovratovich);
        assert_eq!(config.gap_limit, 20);
        assert!(config.debug_logging);
    }

    #[test]
    fn test_invalid_overrides() {
        assert!(CoreConfig::default()
            .with_overrides(|key| (key == ENV_GAP_LIMIT).then(|| "0".to_string()))
            .is_err());
        assert!(CoreConfig::default()
            .with_overrides(|key| (key == ENV_NETWORK).then(|| "betanet".to_string()))
            .is_err());
    }

    #[test]
    fn test_from_file_with_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.json");
        std::fs::write(&path, r#"{"network":"testnet"}"#).unwrap();

        let config = CoreConfig::from_file(&path).unwrap();
        assert_eq!(config.network, AlgorandNetwork::TestNet);
        assert_eq!(config.gap_limit, DEFAULT_GAP_LIMIT);
    }
}
