//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod logging;
pub mod network_config;

pub use network_config::{AlgorandNetwork, Arc59AppConfig, CoreConfig};
