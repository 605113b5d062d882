//! Collaborator interfaces consumed and exposed by the auth layer.
//!
//! The background reads wallet state and origin permissions from stores it
//! does not own, and announces auth transitions through hooks. In-memory
//! implementations back tests and the standalone binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Wallet-level flags read from the settings store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSettings {
    /// Onboarding completed.
    pub init: bool,
    /// Legal terms accepted.
    pub terms_agreed: bool,
    /// Vault locked.
    pub is_locked: bool,
}

impl WalletSettings {
    /// Initialized, terms accepted, unlocked.
    pub fn ready() -> Self {
        Self {
            init: true,
            terms_agreed: true,
            is_locked: false,
        }
    }
}

/// Accounts a domain may see, optionally time-limited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    /// Host name the grant applies to.
    pub domain: String,
    /// Exposed accounts.
    pub accounts: Vec<String>,
    /// Expiry in Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl PermissionGrant {
    /// Whether the grant has lapsed at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Read access to wallet settings and the active profile.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Wallet flags, or `None` before the wallet was ever set up.
    async fn wallet_settings(&self) -> Option<WalletSettings>;
    /// Whether a usable profile exists.
    async fn has_profile(&self) -> bool;
}

/// Per-domain account permissions.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Grant for `domain`, if any.
    async fn get_permission(&self, domain: &str) -> Option<PermissionGrant>;
    /// Create or replace a grant.
    async fn grant(&self, grant: PermissionGrant);
    /// Remove the grant for `domain`. Returns whether one existed.
    async fn revoke(&self, domain: &str) -> bool;
}

/// Fan-out of session transitions to every open context.
#[async_trait]
pub trait SessionBroadcaster: Send + Sync {
    /// Deliver `payload` under `kind`. Never fails; delivery is best-effort.
    async fn broadcast(&self, kind: &str, payload: Value);
}

/// Badge or icon reflecting authentication state.
pub trait AuthIndicator: Send + Sync {
    /// Show the authenticated or signed-out state.
    fn set_authenticated(&self, authenticated: bool);
}

/// Indicator that displays nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopIndicator;

impl AuthIndicator for NoopIndicator {
    fn set_authenticated(&self, _authenticated: bool) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory stores
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory [`SettingsStore`].
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Option<WalletSettings>>,
    profile: AtomicBool,
}

impl MemorySettingsStore {
    /// Store holding `settings` and, if `has_profile`, a profile.
    pub fn new(settings: Option<WalletSettings>, has_profile: bool) -> Self {
        Self {
            settings: RwLock::new(settings),
            profile: AtomicBool::new(has_profile),
        }
    }

    /// Replace the wallet flags.
    pub fn set(&self, settings: Option<WalletSettings>) {
        *self.settings.write() = settings;
    }

    /// Lock or unlock the wallet. No-op before setup.
    pub fn set_locked(&self, locked: bool) {
        if let Some(s) = self.settings.write().as_mut() {
            s.is_locked = locked;
        }
    }

    /// Add or remove the profile.
    pub fn set_profile(&self, present: bool) {
        self.profile.store(present, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn wallet_settings(&self) -> Option<WalletSettings> {
        self.settings.read().clone()
    }

    async fn has_profile(&self) -> bool {
        self.profile.load(Ordering::SeqCst)
    }
}

/// In-memory [`PermissionStore`].
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    grants: RwLock<HashMap<String, PermissionGrant>>,
}

impl MemoryPermissionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn get_permission(&self, domain: &str) -> Option<PermissionGrant> {
        self.grants.read().get(domain).cloned()
    }

    async fn grant(&self, grant: PermissionGrant) {
        let _ = self.grants.write().insert(grant.domain.clone(), grant);
    }

    async fn revoke(&self, domain: &str) -> bool {
        self.grants.write().remove(domain).is_some()
    }
}
