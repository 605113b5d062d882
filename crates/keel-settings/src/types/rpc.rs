//! Vendor RPC settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A fixed URL for one `(vendor, chain)` pair, bypassing the routing table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointOverride {
    /// Vendor id (`alchemy`, `infura`, `quicknode`).
    pub vendor: String,
    /// Numeric chain id.
    pub chain_id: u64,
    /// Full JSON-RPC URL.
    pub url: String,
}

/// Vendor RPC settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcSettings {
    /// Per-call timeout.
    pub timeout_ms: u64,
    /// Attempt ceiling for every retry loop.
    pub max_attempts: u32,
    /// Base delay for transport failures.
    pub base_backoff_ms: u64,
    /// Base delay for rate-limit responses.
    pub rate_limit_backoff_ms: u64,
    /// Minimum spacing between balance dispatches.
    pub balance_spacing_ms: u64,
    /// Vendors tried in order.
    pub vendor_order: Vec<String>,
    /// API key per vendor id.
    pub api_keys: BTreeMap<String, String>,
    /// Fixed endpoints that take precedence over the routing table.
    pub endpoint_overrides: Vec<EndpointOverride>,
    /// Consecutive exhausted calls before a vendor is suspended.
    pub failure_threshold: u32,
    /// How long a suspended vendor is skipped.
    pub suspend_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_attempts: 3,
            base_backoff_ms: 500,
            rate_limit_backoff_ms: 1000,
            balance_spacing_ms: 100,
            vendor_order: vec![
                "alchemy".to_string(),
                "infura".to_string(),
                "quicknode".to_string(),
            ],
            api_keys: BTreeMap::new(),
            endpoint_overrides: Vec::new(),
            failure_threshold: 3,
            suspend_ms: 300_000,
        }
    }
}
