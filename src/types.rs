//! Shared types for the HD wallet core
//!
//! Small aliases and the FFI response envelope used across modules.

use serde::{Deserialize, Serialize};

/// Amount of microAlgos (1 Algo = 1_000_000 microAlgos)
pub type MicroAlgos = u64;

/// Base32 Algorand address string
pub type Address = String;

/// Opaque wallet identifier (UUID v4 string)
pub type WalletId = String;

// =============================================================================
// API Response Wrapper
// =============================================================================

/// Standard API response wrapper for FFI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<crate::error::CoreError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: crate::error::CoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"code":"internal","message":"Serialization failed"}}"#
                .to_string()
        })
    }
}
