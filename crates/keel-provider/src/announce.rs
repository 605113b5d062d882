//! EIP-6963 multi-provider discovery.

use std::sync::atomic::{AtomicBool, Ordering};

use keel_settings::ProviderSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

/// Window event carrying a provider announcement.
pub const ANNOUNCE_EVENT: &str = "eip6963:announceProvider";
/// Window event a page dispatches to ask providers to announce.
pub const REQUEST_PROVIDER_EVENT: &str = "eip6963:requestProvider";

/// Identity advertised to pages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Per-instance identifier.
    pub uuid: Uuid,
    /// Human-readable wallet name.
    pub name: String,
    /// Data URI of the wallet icon.
    pub icon: String,
    /// Reverse-DNS identifier.
    pub rdns: String,
}

impl ProviderInfo {
    /// Fresh identity with a new uuid.
    pub fn new(name: impl Into<String>, icon: impl Into<String>, rdns: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::now_v7(),
            name: name.into(),
            icon: icon.into(),
            rdns: rdns.into(),
        }
    }

    /// Identity from provider settings.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(
            settings.announce_name.clone(),
            settings.announce_icon.clone(),
            settings.announce_rdns.clone(),
        )
    }

    /// The announcement event as dispatched to the window.
    pub fn announcement(&self) -> Value {
        json!({
            "type": ANNOUNCE_EVENT,
            "detail": { "info": self },
        })
    }
}

/// Announces once on load and again for every provider request.
#[derive(Debug)]
pub struct Announcer {
    info: ProviderInfo,
    announced: AtomicBool,
}

impl Announcer {
    /// Announcer for `info`.
    pub fn new(info: ProviderInfo) -> Self {
        Self {
            info,
            announced: AtomicBool::new(false),
        }
    }

    /// Advertised identity.
    pub fn info(&self) -> &ProviderInfo {
        &self.info
    }

    /// The initial announcement, or `None` if already made.
    pub fn announce(&self) -> Option<Value> {
        if self.announced.swap(true, Ordering::SeqCst) {
            debug!("provider already announced");
            return None;
        }
        debug!(name = %self.info.name, rdns = %self.info.rdns, "announcing provider");
        Some(self.info.announcement())
    }

    /// Answer a window event. Only provider requests get a reply.
    pub fn on_window_event(&self, event: &str) -> Option<Value> {
        if event != REQUEST_PROVIDER_EVENT {
            return None;
        }
        self.announced.store(true, Ordering::SeqCst);
        Some(self.info.announcement())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
