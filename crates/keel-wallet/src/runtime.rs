//! Process wiring.
//!
//! Construction order follows the dependency graph: the connection manager
//! first (it is the session broadcaster), then the session authority, the
//! authorizer, the dispatcher, and finally the hub that serves channels.
//! Pages attach afterwards through [`WalletRuntime::open_page`].

use std::sync::Arc;
use std::time::Duration;

use keel_auth::{
    AuthIndicator, PermissionStore, RequestAuthorizer, SessionAuthority, SessionConfig,
    SettingsStore, TokenIssuer,
};
use keel_background::{
    ApprovalPrompt, BackgroundHub, ConnectionManager, DispatcherParts, RequestDispatcher, Signer,
};
use keel_core::{Clock, Connector};
use keel_provider::{Announcer, FacadeConfig, ProviderFacade, ProviderInfo};
use keel_relay::{ContentRelay, RelayConfig, TabInfo, WindowHandle};
use keel_rpc::ChainRpc;
use keel_settings::KeelSettings;
use keel_store::KeyValueStore;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bridge::{RelayTransport, spawn_window_pump};

/// File name of the durable store inside the data directory.
pub const STORE_FILE: &str = "keel.db";

/// Collaborators supplied by the embedding process.
pub struct RuntimeParts {
    /// Durable key-value storage.
    pub store: Arc<dyn KeyValueStore>,
    /// Chain access.
    pub rpc: Arc<dyn ChainRpc>,
    /// Wallet flags and profile.
    pub wallet_settings: Arc<dyn SettingsStore>,
    /// Origin grants.
    pub permissions: Arc<dyn PermissionStore>,
    /// Vault.
    pub signer: Arc<dyn Signer>,
    /// Consent UI.
    pub prompt: Arc<dyn ApprovalPrompt>,
    /// Badge.
    pub indicator: Arc<dyn AuthIndicator>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// The background process.
pub struct WalletRuntime {
    settings: KeelSettings,
    session: Arc<SessionAuthority>,
    manager: Arc<ConnectionManager>,
    hub: Arc<BackgroundHub>,
    cancel: CancellationToken,
    checker: Mutex<Option<JoinHandle<()>>>,
}

impl WalletRuntime {
    /// Build every component, restore persisted state, and start the session checker.
    pub async fn start(settings: KeelSettings, parts: RuntimeParts) -> Self {
        let manager = Arc::new(ConnectionManager::new(parts.store.clone(), parts.clock.clone()));
        let restored = manager.restore().await;

        let ttl = Duration::from_secs(settings.session.token_ttl_minutes * 60);
        let tokens = match settings.session.signing_secret.as_deref() {
            Some(secret) if !secret.is_empty() => TokenIssuer::new(secret.as_bytes(), ttl),
            _ => TokenIssuer::with_random_secret(ttl),
        };
        let session = Arc::new(SessionAuthority::new(
            SessionConfig::from_settings(&settings.session),
            tokens,
            parts.clock.clone(),
            parts.store.clone(),
            manager.clone(),
            parts.indicator,
        ));
        let phase = session.restore().await;

        let authorizer = Arc::new(RequestAuthorizer::new(
            parts.wallet_settings,
            parts.permissions.clone(),
            session.clone(),
            parts.clock.clone(),
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(
            DispatcherParts {
                authorizer,
                permissions: parts.permissions,
                signer: parts.signer,
                prompt: parts.prompt,
                rpc: parts.rpc,
                clock: parts.clock,
            },
            settings.background.default_chain_id,
        ));
        let hub = Arc::new(BackgroundHub::new(
            dispatcher,
            manager.clone(),
            settings.background.connection_capacity,
        ));

        let cancel = CancellationToken::new();
        let checker = session.spawn_checker(cancel.child_token());
        info!(
            queued = restored,
            session = ?phase,
            chain_id = settings.background.default_chain_id,
            "wallet runtime started"
        );

        Self {
            settings,
            session,
            manager,
            hub,
            cancel,
            checker: Mutex::new(Some(checker)),
        }
    }

    /// Effective settings.
    pub fn settings(&self) -> &KeelSettings {
        &self.settings
    }

    /// Session authority.
    pub fn session(&self) -> &Arc<SessionAuthority> {
        &self.session
    }

    /// Connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Channel hub.
    pub fn hub(&self) -> &Arc<BackgroundHub> {
        &self.hub
    }

    /// Request dispatcher.
    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        self.hub.dispatcher()
    }

    /// Attach a page at `origin`: window, relay, facade, and announcer.
    pub async fn open_page(&self, origin: &str, tab: TabInfo) -> PageContext {
        let (window, window_rx) = WindowHandle::new(origin, tab);
        let window = Arc::new(window);

        let connector: Arc<dyn Connector> = self.hub.clone();
        let relay = Arc::new(ContentRelay::new(
            RelayConfig::from_settings(&self.settings.relay, self.settings.provider.use_discovery, origin),
            connector,
            window.clone(),
        ));
        let relay_task = relay.start().await;

        let transport = Arc::new(RelayTransport::new(relay.clone(), origin));
        let facade = Arc::new(ProviderFacade::new(
            FacadeConfig::from_settings(&self.settings.provider),
            transport,
        ));
        let pump = spawn_window_pump(window_rx, facade.clone(), self.cancel.child_token());
        let announcer = Announcer::new(ProviderInfo::from_settings(&self.settings.provider));
        info!(%origin, "page attached");

        PageContext {
            origin: origin.to_string(),
            window,
            relay,
            facade,
            announcer,
            tasks: vec![relay_task, pump],
        }
    }

    /// Stop background tasks.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let checker = self.checker.lock().take();
        if let Some(checker) = checker {
            let _ = checker.await;
        }
        info!("wallet runtime stopped");
    }
}

/// Everything living in one page.
pub struct PageContext {
    /// Document origin.
    pub origin: String,
    /// The page window.
    pub window: Arc<WindowHandle>,
    /// The page's relay.
    pub relay: Arc<ContentRelay>,
    /// The provider exposed to page code.
    pub facade: Arc<ProviderFacade>,
    /// EIP-6963 announcer.
    pub announcer: Announcer,
    tasks: Vec<JoinHandle<()>>,
}

impl PageContext {
    /// Tear the page down, failing anything still pending.
    pub fn close(self) {
        self.relay.shutdown();
        self.facade.disconnect();
        for task in self.tasks {
            task.abort();
        }
    }
}
