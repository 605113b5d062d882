//! Session lifecycle settings.

use serde::{Deserialize, Serialize};

/// Session timing and token settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Session lifetime from start or last extension.
    pub timeout_minutes: u64,
    /// Lead time before expiry at which the warning fires.
    pub warning_minutes: u64,
    /// Inactivity after which the session is logged out.
    pub max_inactivity_minutes: u64,
    /// Extend automatically on activity inside the warning window.
    pub auto_extend_on_activity: bool,
    /// Bearer token lifetime.
    pub token_ttl_minutes: u64,
    /// Interval of the periodic expiry checker.
    pub check_interval_ms: u64,
    /// HMAC secret for bearer tokens; a random one is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            warning_minutes: 2,
            max_inactivity_minutes: 60,
            auto_extend_on_activity: true,
            token_ttl_minutes: 60,
            check_interval_ms: 1000,
            signing_secret: None,
        }
    }
}
