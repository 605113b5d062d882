//! JSON-RPC client error types.

use keel_core::{BackoffClass, ErrorKind, ProviderRpcError, RetryDecision, Retryable};
use serde_json::Value;

use crate::endpoint::Vendor;

/// JSON-RPC error codes vendors use to signal rate limiting.
const RATE_LIMIT_CODES: [i64; 2] = [429, -32005];

/// Errors raised by the JSON-RPC client and pool.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcClientError {
    /// No endpoint could be resolved (missing credential).
    #[error("no endpoint for {vendor} on chain {chain_id}")]
    NoEndpoint {
        /// Vendor asked for.
        vendor: Vendor,
        /// Chain asked for.
        chain_id: u64,
    },

    /// Every configured vendor was skipped or unavailable.
    #[error("no vendor available for chain {0}")]
    NoVendorAvailable(u64),

    /// The call exceeded its timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body (truncated).
        message: String,
    },

    /// The vendor is rate limiting (HTTP 429 or a rate-limit JSON-RPC code).
    #[error("rate limited: {message}")]
    RateLimited {
        /// Upstream message.
        message: String,
    },

    /// The response carried a JSON-RPC `error` member.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Upstream code.
        code: i64,
        /// Upstream message.
        message: String,
        /// Upstream data.
        data: Option<Value>,
    },

    /// The response was not a JSON-RPC 2.0 object.
    #[error("invalid JSON-RPC response: {0}")]
    Decode(String),
}

impl RpcClientError {
    /// Classify a JSON-RPC `error` member.
    pub fn from_rpc_error(code: i64, message: String, data: Option<Value>) -> Self {
        if RATE_LIMIT_CODES.contains(&code) {
            Self::RateLimited { message }
        } else {
            Self::JsonRpc {
                code,
                message,
                data,
            }
        }
    }

    /// Whether failing over to another vendor could help.
    pub fn is_vendor_fault(&self) -> bool {
        !matches!(self, Self::JsonRpc { .. })
    }
}

impl Retryable for RpcClientError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::Http { .. } => {
                RetryDecision::Retry(BackoffClass::Transport)
            }
            Self::RateLimited { .. } => RetryDecision::Retry(BackoffClass::RateLimited),
            Self::NoEndpoint { .. }
            | Self::NoVendorAvailable(_)
            | Self::JsonRpc { .. }
            | Self::Decode(_) => RetryDecision::Stop,
        }
    }
}

impl From<RpcClientError> for ProviderRpcError {
    fn from(err: RpcClientError) -> Self {
        match err {
            RpcClientError::RateLimited { message } => {
                ProviderRpcError::new(ErrorKind::RateLimited, message)
            }
            RpcClientError::JsonRpc {
                code,
                message,
                data,
            } => ProviderRpcError {
                kind: ErrorKind::from_code(code),
                code,
                message,
                data,
            },
            other => ProviderRpcError::new(ErrorKind::TransportFailure, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rate_limit_codes_classified() {
        assert_matches!(
            RpcClientError::from_rpc_error(-32005, "limit exceeded".into(), None),
            RpcClientError::RateLimited { .. }
        );
        assert_matches!(
            RpcClientError::from_rpc_error(3, "execution reverted".into(), None),
            RpcClientError::JsonRpc { code: 3, .. }
        );
    }

    #[test]
    fn retry_classes() {
        assert_eq!(
            RpcClientError::Timeout(10_000).retry_decision(),
            RetryDecision::Retry(BackoffClass::Transport)
        );
        assert_eq!(
            RpcClientError::RateLimited { message: String::new() }.retry_decision(),
            RetryDecision::Retry(BackoffClass::RateLimited)
        );
        assert_eq!(
            RpcClientError::Decode("x".into()).retry_decision(),
            RetryDecision::Stop
        );
    }

    #[test]
    fn json_rpc_error_keeps_upstream_message() {
        let err: ProviderRpcError = RpcClientError::JsonRpc {
            code: -32000,
            message: "insufficient funds".into(),
            data: None,
        }
        .into();
        assert_eq!(err.message, "insufficient funds");
        assert_eq!(err.kind, ErrorKind::TransportFailure);
    }

    #[test]
    fn timeout_maps_to_transport_failure() {
        let err: ProviderRpcError = RpcClientError::Timeout(8000).into();
        assert_eq!(err.kind, ErrorKind::TransportFailure);
        assert!(err.message.contains("8000"));
    }

    #[test]
    fn only_semantic_errors_skip_failover() {
        assert!(RpcClientError::Http { status: 502, message: String::new() }.is_vendor_fault());
        assert!(!RpcClientError::JsonRpc { code: 3, message: String::new(), data: None }.is_vendor_fault());
    }
}
