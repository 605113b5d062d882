//! JSON-RPC 2.0 client over HTTP.
//!
//! Each attempt posts `{jsonrpc, id, method, params}` to the endpoint and is
//! bounded by the client timeout; dropping the in-flight future aborts the
//! request. Failures are classified by [`RpcClientError`] and retried by
//! [`keel_core::retry()`] under the client's [`RetryPolicy`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use keel_core::{RetryPolicy, retry};
use keel_settings::RpcSettings;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::endpoint::EndpointConfig;
use crate::errors::RpcClientError;

/// Longest response body kept in an HTTP error message.
const MAX_ERROR_BODY: usize = 512;

/// Per-call overrides.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Attempt ceiling for this call.
    pub max_attempts: Option<u32>,
    /// Transport backoff base for this call.
    pub base_delay_ms: Option<u64>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct RpcResponseBody {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// JSON-RPC client shared across vendors.
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    timeout: Duration,
    policy: RetryPolicy,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client.
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self, RpcClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RpcClientError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            timeout,
            policy,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a client from settings.
    pub fn from_settings(settings: &RpcSettings) -> Result<Self, RpcClientError> {
        Self::new(
            Duration::from_millis(settings.timeout_ms),
            RetryPolicy {
                max_attempts: settings.max_attempts,
                base_delay_ms: settings.base_backoff_ms,
                rate_limit_delay_ms: settings.rate_limit_backoff_ms,
                ..RetryPolicy::default()
            },
        )
    }

    /// Default retry policy of this client.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `method` with retry.
    #[instrument(skip(self, endpoint, params, options), fields(vendor = %endpoint.vendor, chain_id = endpoint.chain_id))]
    pub async fn request(
        &self,
        endpoint: &EndpointConfig,
        method: &str,
        params: Value,
        options: &RequestOptions,
    ) -> Result<Value, RpcClientError> {
        let mut policy = self.policy.clone();
        if let Some(max) = options.max_attempts {
            policy.max_attempts = max;
        }
        if let Some(base) = options.base_delay_ms {
            policy.base_delay_ms = base;
        }
        let headers = build_headers(&options.headers);

        retry(&policy, |attempt| {
            debug!(attempt, method, "dispatching");
            self.send_once(endpoint, method, &params, &headers)
        })
        .await
    }

    /// One bounded attempt.
    async fn send_once(
        &self,
        endpoint: &EndpointConfig,
        method: &str,
        params: &Value,
        headers: &HeaderMap,
    ) -> Result<Value, RpcClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let call = async {
            let response = self
                .http
                .post(&endpoint.base_url)
                .headers(headers.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| RpcClientError::Transport(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| RpcClientError::Transport(e.to_string()))?;

            if status.as_u16() == 429 {
                return Err(RpcClientError::RateLimited {
                    message: truncate(&text),
                });
            }
            if !status.is_success() {
                return Err(RpcClientError::Http {
                    status: status.as_u16(),
                    message: truncate(&text),
                });
            }
            parse_body(&text)
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(method, timeout_ms = ms, "JSON-RPC call timed out");
                Err(RpcClientError::Timeout(ms))
            }
        }
    }
}

fn parse_body(text: &str) -> Result<Value, RpcClientError> {
    let body: RpcResponseBody =
        serde_json::from_str(text).map_err(|e| RpcClientError::Decode(e.to_string()))?;
    if let Some(err) = body.error {
        return Err(RpcClientError::from_rpc_error(err.code, err.message, err.data));
    }
    Ok(body.result.unwrap_or(Value::Null))
}

fn build_headers(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                let _ = headers.insert(n, v);
            }
            _ => warn!(header = %name, "dropping invalid header"),
        }
    }
    headers
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Vendor;
    use assert_matches::assert_matches;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer) -> EndpointConfig {
        EndpointConfig {
            vendor: Vendor::Alchemy,
            chain_id: 1,
            base_url: server.uri(),
            api_key: String::new(),
            network: "mainnet".into(),
        }
    }

    fn fast_client() -> JsonRpcClient {
        JsonRpcClient::new(
            Duration::from_secs(2),
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 10,
                rate_limit_delay_ms: 20,
                max_delay_ms: 1000,
            },
        )
        .unwrap()
    }

    fn ok(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
    }

    #[tokio::test]
    async fn sends_json_rpc_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "params": []})))
            .respond_with(ok(json!("0x10")))
            .expect(1)
            .mount(&server)
            .await;

        let result = fast_client()
            .request(&endpoint(&server), "eth_blockNumber", json!([]), &RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("0x10"));
    }

    #[tokio::test]
    async fn json_rpc_error_surfaces_upstream_message_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": -32000, "message": "insufficient funds for gas"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = fast_client()
            .request(&endpoint(&server), "eth_estimateGas", json!([{}]), &RequestOptions::default())
            .await
            .unwrap_err();
        assert_matches!(err, RpcClientError::JsonRpc { code: -32000, ref message, .. } if message == "insufficient funds for gas");
    }

    #[tokio::test]
    async fn server_errors_retry_up_to_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let err = fast_client()
            .request(&endpoint(&server), "eth_call", json!([]), &RequestOptions::default())
            .await
            .unwrap_err();
        assert_matches!(err, RpcClientError::Http { status: 503, .. });
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ok(json!("0x1")))
            .mount(&server)
            .await;

        let result = fast_client()
            .request(&endpoint(&server), "eth_chainId", json!([]), &RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("0x1"));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rate_limit_backs_off_one_then_two_seconds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ok(json!("0xde0b6b3a7640000")))
            .mount(&server)
            .await;

        let client = JsonRpcClient::new(Duration::from_secs(5), RetryPolicy::default()).unwrap();
        let started = Instant::now();
        let result = client
            .request(&endpoint(&server), "eth_getBalance", json!(["0xabc", "latest"]), &RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(result, json!("0xde0b6b3a7640000"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn slow_vendor_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ok(json!("0x1")).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = JsonRpcClient::new(
            Duration::from_millis(50),
            RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
        )
        .unwrap();
        let err = client
            .request(&endpoint(&server), "eth_chainId", json!([]), &RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, RpcClientError::Timeout(50));
    }

    #[tokio::test]
    async fn per_call_options_apply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-client", "keel-test"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let options = RequestOptions {
            headers: vec![("x-client".into(), "keel-test".into())],
            max_attempts: Some(1),
            base_delay_ms: Some(1),
        };
        let err = fast_client()
            .request(&endpoint(&server), "eth_call", json!([]), &options)
            .await
            .unwrap_err();
        assert_matches!(err, RpcClientError::Http { status: 500, .. });
    }

    #[test]
    fn non_json_body_is_decode_error() {
        assert_matches!(parse_body("<html>"), Err(RpcClientError::Decode(_)));
    }

    #[test]
    fn missing_result_reads_null() {
        assert_eq!(parse_body(r#"{"jsonrpc":"2.0","id":1}"#).unwrap(), Value::Null);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(400);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);
    }
}
