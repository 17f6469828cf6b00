//! FFI Layer
//!
//! All C-ABI exports are defined here. Every function follows the same
//! pattern:
//! - Input: JSON string (null-terminated C string)
//! - Output: JSON string (must be freed with `algo_hd_free_string`)
//!
//! Error handling: every response carries a `success` field. On error,
//! `success: false` and the `error` object is populated.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::crypto::address::decode_address;
use crate::error::{CoreError, CoreResult};
use crate::tx::{
    AlgosTransactionSendDraft, TransactionAmountCalculator, TransactionDataBuilder, TransactionParams,
    TransactionSendDraft, CanonicalComposer,
};
use crate::types::ApiResponse;
use crate::wallet::{derivation_path, AccountAuthorizationResolver, AccountInformation};

// =============================================================================
// Memory Management
// =============================================================================

/// Free a string returned by any algo_hd_* function
///
/// # Safety
/// The pointer must have been returned by an algo_hd_* function
#[unsafe(no_mangle)]
pub extern "C" fn algo_hd_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_input<T: DeserializeOwned>(input: *const c_char) -> CoreResult<T> {
    if input.is_null() {
        return Err(CoreError::invalid_input("Null input pointer"));
    }
    let c_str = unsafe { CStr::from_ptr(input) };
    let json = c_str
        .to_str()
        .map_err(|_| CoreError::invalid_input("Invalid UTF-8 string"))?;
    Ok(serde_json::from_str(json)?)
}

fn respond<T: Serialize>(result: CoreResult<T>) -> *mut c_char {
    let json = match result {
        Ok(data) => ApiResponse::ok(data).to_json(),
        Err(error) => ApiResponse::<()>::err(error).to_json(),
    };
    string_to_ptr(json)
}

fn string_to_ptr(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Parse the request, run `f`, wrap the outcome
fn handle<I, O, F>(input: *const c_char, f: F) -> *mut c_char
where
    I: DeserializeOwned,
    O: Serialize,
    F: FnOnce(I) -> CoreResult<O>,
{
    respond(parse_input(input).and_then(f))
}

// =============================================================================
// Derivation
// =============================================================================

#[derive(Deserialize)]
struct PathRequest {
    account: u32,
    #[serde(default)]
    change: u32,
    #[serde(default)]
    key_index: u32,
}

#[derive(Serialize)]
struct PathResponse {
    path: String,
}

/// BIP-44 path for an Algorand address coordinate
///
/// # Input
/// ```json
/// { "account": 0, "change": 0, "key_index": 3 }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "path": "m/44'/283'/0'/0/3" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn algo_hd_derivation_path(input: *const c_char) -> *mut c_char {
    handle(input, |request: PathRequest| {
        Ok(PathResponse {
            path: derivation_path(request.account, request.change, request.key_index)?,
        })
    })
}

// =============================================================================
// Addresses
// =============================================================================

#[derive(Deserialize)]
struct AddressRequest {
    address: String,
}

#[derive(Serialize)]
struct AddressValidation {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Check an address checksum and return its public key
#[unsafe(no_mangle)]
pub extern "C" fn algo_hd_validate_address(input: *const c_char) -> *mut c_char {
    handle(input, |request: AddressRequest| {
        Ok(match decode_address(request.address.trim()) {
            Ok(public_key) => AddressValidation {
                valid: true,
                public_key: Some(hex::encode(public_key)),
                reason: None,
            },
            Err(e) => AddressValidation {
                valid: false,
                public_key: None,
                reason: Some(e.to_string()),
            },
        })
    })
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Deserialize)]
struct AmountRequest {
    draft: AlgosTransactionSendDraft,
    params: TransactionParams,
    #[serde(default)]
    initial_size: Option<usize>,
}

/// Amount, fee and minimum balance for an ALGO payment draft
#[unsafe(no_mangle)]
pub extern "C" fn algo_hd_calculate_amount(input: *const c_char) -> *mut c_char {
    handle(input, |request: AmountRequest| {
        Ok(TransactionAmountCalculator::new(&request.params, request.initial_size)
            .calculate(&request.draft))
    })
}

#[derive(Deserialize)]
struct ComposeRequest {
    draft: TransactionSendDraft,
    params: TransactionParams,
    #[serde(default)]
    initial_size: Option<usize>,
}

/// Ready-to-sign transactions for any send draft
#[unsafe(no_mangle)]
pub extern "C" fn algo_hd_compose_transactions(input: *const c_char) -> *mut c_char {
    handle(input, |request: ComposeRequest| {
        let builder = TransactionDataBuilder::new(&request.params, request.initial_size, &CanonicalComposer);
        Ok(builder.compose(&request.draft)?)
    })
}

#[derive(Deserialize)]
struct SignerRequest {
    address: String,
    accounts: Vec<AccountInformation>,
}

/// Which key signs for `address`, given the local accounts
#[unsafe(no_mangle)]
pub extern "C" fn algo_hd_resolve_signer(input: *const c_char) -> *mut c_char {
    handle(input, |request: SignerRequest| {
        for account in &request.accounts {
            account.validate()?;
        }
        let resolver = AccountAuthorizationResolver::new(&request.accounts);
        Ok(resolver.resolve_address(&request.address))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn call(f: extern "C" fn(*const c_char) -> *mut c_char, input: &str) -> Value {
        let input = CString::new(input).unwrap();
        let output = f(input.as_ptr());
        let json = unsafe { CStr::from_ptr(output) }.to_str().unwrap().to_string();
        algo_hd_free_string(output);
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_derivation_path() {
        let response = call(algo_hd_derivation_path, r#"{"account":2,"key_index":7}"#);
        assert_eq!(response["success"], true);
        assert_eq!(response["data"]["path"], "m/44'/283'/2'/0/7");

        let response = call(algo_hd_derivation_path, r#"{"account":2147483648}"#);
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["code"], "invalid_input");
    }

    #[test]
    fn test_validate_address() {
        let response = call(
            algo_hd_validate_address,
            r#"{"address":"YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ"}"#,
        );
        assert_eq!(response["data"]["valid"], true);
        assert_eq!(response["data"]["public_key"].as_str().unwrap().len(), 64);

        let response = call(algo_hd_validate_address, r#"{"address":"ABC"}"#);
        assert_eq!(response["data"]["valid"], false);
    }

    #[test]
    fn test_calculate_amount() {
        let input = r#"{
            "draft": {
                "from": {"address": "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ", "amount": 10000000},
                "amount": 10000000,
                "is_max_transaction": true
            },
            "params": {"fee": 0, "min-fee": 1000, "last-round": 1, "genesis-id": "testnet-v1.0", "genesis-hash": "AAAA"}
        }"#;
        let response = call(algo_hd_calculate_amount, input);
        assert_eq!(response["data"]["amount"], 9_999_000);
        assert_eq!(response["data"]["is_max_transaction"], true);
    }

    #[test]
    fn test_compose_rejects_bad_receiver() {
        let input = r#"{
            "draft": {
                "type": "algos",
                "from": {"address": "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ", "amount": 10000000},
                "to": {"kind": "account", "address": "nope"},
                "amount": 5
            },
            "params": {"fee": 0, "min-fee": 1000, "last-round": 1, "genesis-id": "testnet-v1.0", "genesis-hash": "AAAA"}
        }"#;
        let response = call(algo_hd_compose_transactions, input);
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["code"], "invalid_transaction");
    }

    #[test]
    fn test_resolve_signer() {
        let input = r#"{
            "address": "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ",
            "accounts": [{"address": "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ", "name": "w", "type": "watch"}]
        }"#;
        let response = call(algo_hd_resolve_signer, input);
        assert_eq!(response["data"]["kind"], "unsignable");
    }

    #[test]
    fn test_resolve_signer_rejects_conflicting_account() {
        let input = r#"{
            "address": "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ",
            "accounts": [{
                "address": "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ",
                "name": "w",
                "type": "watch",
                "ledger_detail": {"id": "device", "name": "Nano", "index_in_ledger": 0}
            }]
        }"#;
        let response = call(algo_hd_resolve_signer, input);
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["code"], "invalid_input");

        let input = r#"{"address": "SENDER", "accounts": [{"address": "SENDER", "name": "x", "type": "standard"}]}"#;
        let response = call(algo_hd_resolve_signer, input);
        assert_eq!(response["error"]["code"], "invalid_address");
    }

    #[test]
    fn test_bad_json() {
        let response = call(algo_hd_derivation_path, "not json");
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["code"], "json_error");
    }
}
