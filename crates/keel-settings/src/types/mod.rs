//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Every struct is `#[serde(default)]`
//! so partial JSON fills missing fields from the defaults.

mod rpc;
mod runtime;
mod session;

pub use rpc::*;
pub use runtime::*;
pub use session::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Keel wallet relay.
///
/// ```json
/// {
///   "logging": { "level": "debug" },
///   "rpc": { "apiKeys": { "alchemy": "..." } }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeelSettings {
    /// Settings schema version.
    pub version: String,
    /// Directory for durable state (relative paths resolve under `~/.keel`).
    pub data_dir: String,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Page-side provider settings.
    pub provider: ProviderSettings,
    /// Content relay settings.
    pub relay: RelaySettings,
    /// Background connection manager settings.
    pub background: BackgroundSettings,
    /// Session lifecycle settings.
    pub session: SessionSettings,
    /// Vendor RPC settings.
    pub rpc: RpcSettings,
}

impl Default for KeelSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            data_dir: "data".to_string(),
            logging: LoggingSettings::default(),
            provider: ProviderSettings::default(),
            relay: RelaySettings::default(),
            background: BackgroundSettings::default(),
            session: SessionSettings::default(),
            rpc: RpcSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
