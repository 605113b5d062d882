//! Structural parameter validation.
//!
//! Checks shape only and is independent of authorization: a well-formed
//! request from an unauthorized origin passes here and fails in the
//! authorizer.

use keel_core::ProviderRpcError;
use serde_json::Value;

/// Parameter shape failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParamError(pub &'static str);

impl From<ParamError> for ProviderRpcError {
    fn from(err: ParamError) -> Self {
        ProviderRpcError::invalid_params(err.0)
    }
}

fn has_string(obj: &Value, key: &str) -> bool {
    obj.get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Check that `params` has the shape `method` needs.
pub fn validate_params(method: &str, params: &[Value]) -> Result<(), ParamError> {
    match method {
        "eth_sendTransaction" | "eth_signTransaction" => {
            let Some(tx) = params.first() else {
                return Err(ParamError("Transaction parameters required"));
            };
            if !has_string(tx, "from") || !has_string(tx, "to") {
                return Err(ParamError("Transaction must have from and to addresses"));
            }
        }
        "personal_sign" | "eth_sign" => {
            if params.len() < 2 {
                return Err(ParamError("Message and address required"));
            }
        }
        "eth_signTypedData" | "eth_signTypedData_v3" | "eth_signTypedData_v4" => {
            if params.len() < 2 {
                return Err(ParamError("Address and typed data required"));
            }
        }
        "wallet_switchEthereumChain" | "wallet_addEthereumChain" => {
            if !params.first().is_some_and(|p| has_string(p, "chainId")) {
                return Err(ParamError("Chain id required"));
            }
        }
        "eth_getBalance" | "eth_getCode" | "eth_getTransactionCount" => {
            if !params.first().is_some_and(Value::is_string) {
                return Err(ParamError("Address required"));
            }
        }
        "eth_getTransactionReceipt" => {
            if !params.first().is_some_and(Value::is_string) {
                return Err(ParamError("Transaction hash required"));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(method: &str, params: Value) -> Result<(), ParamError> {
        let Value::Array(items) = params else {
            panic!("params must be an array");
        };
        validate_params(method, &items)
    }

    #[test]
    fn transaction_needs_from_and_to() {
        assert_eq!(
            check("eth_sendTransaction", json!([])),
            Err(ParamError("Transaction parameters required"))
        );
        assert_eq!(
            check("eth_sendTransaction", json!([{"from": "0xa"}])),
            Err(ParamError("Transaction must have from and to addresses"))
        );
        assert!(check("eth_sendTransaction", json!([{"from": "0xa", "to": "0xb"}])).is_ok());
    }

    #[test]
    fn signing_needs_message_and_address() {
        assert_eq!(
            check("personal_sign", json!(["0xdead"])),
            Err(ParamError("Message and address required"))
        );
        assert!(check("personal_sign", json!(["0xdead", "0xabc"])).is_ok());
        assert_eq!(
            check("eth_signTypedData_v4", json!(["0xabc"])),
            Err(ParamError("Address and typed data required"))
        );
    }

    #[test]
    fn chain_switch_needs_chain_id() {
        assert!(check("wallet_switchEthereumChain", json!([{"chainId": "0x89"}])).is_ok());
        assert!(check("wallet_switchEthereumChain", json!([{}])).is_err());
    }

    #[test]
    fn unrelated_methods_pass() {
        assert!(check("eth_chainId", json!([])).is_ok());
        assert!(check("made_up", json!([1, 2, 3])).is_ok());
    }

    #[test]
    fn converts_to_invalid_params() {
        let err: ProviderRpcError = ParamError("Address required").into();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "Address required");
    }
}
