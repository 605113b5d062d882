//! Provider, relay, and background settings.

use serde::{Deserialize, Serialize};

/// Page-side provider settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Round-trip window before a request fails with a timeout.
    pub request_timeout_ms: u64,
    /// Clear cached accounts when `wallet_revokePermissions` succeeds.
    pub clear_accounts_on_revoke: bool,
    /// Use the discovery channel (`false` selects the legacy channel).
    pub use_discovery: bool,
    /// Name announced to discovery-aware pages.
    pub announce_name: String,
    /// Reverse-DNS id announced to discovery-aware pages.
    pub announce_rdns: String,
    /// Icon data URI announced to discovery-aware pages.
    pub announce_icon: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            clear_accounts_on_revoke: true,
            use_discovery: true,
            announce_name: "Keel Wallet".to_string(),
            announce_rdns: "dev.keel.wallet".to_string(),
            announce_icon: "data:image/svg+xml,<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_string(),
        }
    }
}

/// Content relay settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Delays before each discovery reconnect attempt within one cycle.
    pub discovery_backoff_ms: Vec<u64>,
    /// Interval of the discovery health check that restarts a cycle.
    pub health_check_interval_ms: u64,
    /// Delivery attempts for a response whose target frame is blocked.
    pub blocked_retry_attempts: u32,
    /// Base delay for blocked-frame retries (multiplied by the attempt).
    pub blocked_retry_base_ms: u64,
    /// Per-direction buffer of each channel.
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            discovery_backoff_ms: vec![1000, 2000],
            health_check_interval_ms: 60_000,
            blocked_retry_attempts: 3,
            blocked_retry_base_ms: 1000,
            channel_capacity: 64,
        }
    }
}

/// Background connection manager settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundSettings {
    /// Chain selected when no chain has been persisted.
    pub default_chain_id: u64,
    /// Per-connection buffer of role channels.
    pub connection_capacity: usize,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            default_chain_id: 1,
            connection_capacity: 128,
        }
    }
}
