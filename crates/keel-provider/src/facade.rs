//! EIP-1193 provider facade.
//!
//! Every call to [`ProviderFacade::request`] gets a fresh id. Pure reads
//! (`eth_chainId`, `net_version`, and `eth_accounts` once accounts are
//! known) are answered from the cache without a round trip. Everything else
//! is recorded in the pending map, posted through the [`Transport`], and
//! raced against the request timeout; whichever comes first removes the
//! pending entry, so each id ends in exactly one outcome. A caller that stops
//! polling drops its entry with it, and a later answer for that id is
//! dropped as unmatched.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keel_core::{
    Envelope, EventKind, EventMessage, ProviderRpcError, RequestId, RequestMessage, ResponseMessage,
};
use keel_settings::ProviderSettings;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Outbound path toward the wallet.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post one envelope.
    async fn post(&self, envelope: Envelope) -> Result<(), ProviderRpcError>;
}

/// Facade behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacadeConfig {
    /// Round-trip window per request.
    pub request_timeout: Duration,
    /// Send `REQUEST:DISCOVERY` instead of `REQUEST`.
    pub use_discovery: bool,
    /// Forget cached accounts after a successful `wallet_revokePermissions`.
    pub clear_accounts_on_revoke: bool,
}

impl FacadeConfig {
    /// Build from settings.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            use_discovery: settings.use_discovery,
            clear_accounts_on_revoke: settings.clear_accounts_on_revoke,
        }
    }
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default())
    }
}

type Outcome = Result<Value, ProviderRpcError>;

struct Pending {
    tx: oneshot::Sender<Outcome>,
    method: String,
    sent_at: Instant,
}

/// Removes a pending entry when the request future goes away.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<RequestId, Pending>>,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.lock().remove(&self.id) {
            debug!(id = self.id.0, method = %pending.method, "request abandoned by caller");
        }
    }
}

#[derive(Debug, Default)]
struct ProviderCache {
    chain_id: Option<String>,
    network_version: Option<String>,
    accounts: Option<Vec<String>>,
    connected: bool,
}

/// Page-facing provider.
pub struct ProviderFacade {
    config: FacadeConfig,
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, Pending>>,
    cache: RwLock<ProviderCache>,
    events: broadcast::Sender<EventMessage>,
}

impl ProviderFacade {
    /// Create a facade posting through `transport`.
    pub fn new(config: FacadeConfig, transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            transport,
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            cache: RwLock::new(ProviderCache::default()),
            events,
        }
    }

    /// Receive provider events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventMessage> {
        self.events.subscribe()
    }

    /// Cached hex chain id.
    pub fn chain_id(&self) -> Option<String> {
        self.cache.read().chain_id.clone()
    }

    /// Cached accounts, empty when unknown.
    pub fn accounts(&self) -> Vec<String> {
        self.cache.read().accounts.clone().unwrap_or_default()
    }

    /// Whether `connect` has been emitted since the last disconnect.
    pub fn is_connected(&self) -> bool {
        self.cache.read().connected
    }

    /// Requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// EIP-1193 `request`.
    pub async fn request(&self, method: &str, params: Value) -> Outcome {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        if let Some(value) = self.cached(method) {
            debug!(id = id.0, method, "answered from cache");
            return Ok(value);
        }

        let (tx, mut rx) = oneshot::channel();
        let _ = self.pending.lock().insert(
            id,
            Pending {
                tx,
                method: method.to_string(),
                sent_at: Instant::now(),
            },
        );
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let request = RequestMessage::new(id, method, params);
        let envelope = if self.config.use_discovery {
            Envelope::DiscoveryRequest(request)
        } else {
            Envelope::Request(request)
        };
        if let Err(e) = self.transport.post(envelope).await {
            let _ = self.pending.lock().remove(&id);
            warn!(id = id.0, method, error = %e, "failed to post request");
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ProviderRpcError::disconnected()),
            Err(_) => {
                if self.pending.lock().remove(&id).is_some() {
                    warn!(id = id.0, method, timeout = ?self.config.request_timeout, "request timed out");
                    return Err(ProviderRpcError::timeout(method));
                }
                // Resolved between the deadline and the removal above.
                rx.try_recv().unwrap_or_else(|_| Err(ProviderRpcError::timeout(method)))
            }
        }
    }

    /// Accept a raw message posted to the page window.
    pub fn handle_message(&self, message: &Value) {
        match Envelope::parse(message) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(e) => debug!(error = %e, "ignoring non-envelope message"),
        }
    }

    /// Accept an inbound envelope.
    pub fn handle_envelope(&self, envelope: Envelope) {
        match envelope {
            Envelope::Response(response) | Envelope::DiscoveryResponse(response) => {
                self.resolve(response);
            }
            Envelope::Event(event) => self.apply_event(event),
            // Our own requests echoed by the window.
            Envelope::Request(_) | Envelope::DiscoveryRequest(_) => {}
        }
    }

    /// Fail every pending request and emit `disconnect`.
    pub fn disconnect(&self) {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        let error = ProviderRpcError::disconnected();
        info!(pending = drained.len(), "provider disconnected");
        for pending in drained {
            let _ = pending.tx.send(Err(error.clone()));
        }
        self.cache.write().connected = false;
        self.emit(
            EventKind::Disconnect,
            json!({ "code": error.code, "message": error.message }),
        );
    }

    // ── Cache ──────────────────────────────────────────────────────────────

    fn cached(&self, method: &str) -> Option<Value> {
        let cache = self.cache.read();
        match method {
            "eth_chainId" => cache.chain_id.clone().map(Value::String),
            "net_version" => cache.network_version.clone().map(Value::String),
            "eth_accounts" => cache
                .accounts
                .as_ref()
                .filter(|accounts| !accounts.is_empty())
                .map(|accounts| json!(accounts)),
            _ => None,
        }
    }

    fn resolve(&self, response: ResponseMessage) {
        let id = response.id;
        let Some(pending) = self.pending.lock().remove(&id) else {
            debug!(id = id.0, "dropping response with no pending request");
            return;
        };
        let outcome = response.into_result();
        match &outcome {
            Ok(value) => self.absorb(&pending.method, value),
            Err(e) => debug!(id = id.0, method = %pending.method, code = e.code, "request failed"),
        }
        debug!(id = id.0, method = %pending.method, elapsed = ?pending.sent_at.elapsed(), "request resolved");
        if pending.tx.send(outcome).is_err() {
            debug!(id = id.0, "caller stopped waiting");
        }
    }

    fn absorb(&self, method: &str, value: &Value) {
        match method {
            "eth_chainId" => {
                if let Some(hex) = value.as_str() {
                    self.set_chain(hex, false);
                }
            }
            "net_version" => {
                if let Some(version) = value.as_str() {
                    self.cache.write().network_version = Some(version.to_string());
                }
            }
            "eth_accounts" | "eth_requestAccounts" => {
                if let Some(accounts) = parse_accounts(value) {
                    self.set_accounts(accounts, false);
                }
            }
            "wallet_revokePermissions" if self.config.clear_accounts_on_revoke => self.clear_accounts(),
            _ => {}
        }
    }

    fn apply_event(&self, event: EventMessage) {
        match event.event {
            EventKind::ChainChanged => match event.data.as_str() {
                Some(hex) => self.set_chain(hex, true),
                None => warn!(data = %event.data, "malformed chainChanged event"),
            },
            EventKind::AccountsChanged => match parse_accounts(&event.data) {
                Some(accounts) => self.set_accounts(accounts, true),
                None => warn!(data = %event.data, "malformed accountsChanged event"),
            },
            EventKind::Disconnect => {
                self.cache.write().connected = false;
                self.emit(event.event, event.data);
            }
            _ => self.emit(event.event, event.data),
        }
    }

    fn set_chain(&self, hex: &str, from_event: bool) {
        let network = parse_chain_id(hex).map(|id| id.to_string());
        let changed = {
            let mut cache = self.cache.write();
            let changed = cache.chain_id.as_deref() != Some(hex);
            cache.chain_id = Some(hex.to_string());
            if let Some(network) = &network {
                cache.network_version = Some(network.clone());
            }
            changed
        };
        if changed || from_event {
            self.emit(EventKind::ChainChanged, json!(hex));
        }
        if from_event {
            if let Some(network) = network {
                self.emit(EventKind::NetworkChanged, json!(network));
            }
        }
    }

    fn set_accounts(&self, accounts: Vec<String>, from_event: bool) {
        let (changed, first_connect, chain_id) = {
            let mut cache = self.cache.write();
            let changed = cache.accounts.as_ref() != Some(&accounts);
            let first_connect = !accounts.is_empty() && !cache.connected;
            if first_connect {
                cache.connected = true;
            }
            cache.accounts = Some(accounts.clone());
            (changed, first_connect, cache.chain_id.clone())
        };
        if changed || from_event {
            self.emit(EventKind::AccountsChanged, json!(accounts));
        }
        if first_connect {
            info!(accounts = accounts.len(), "provider connected");
            self.emit(EventKind::Connect, json!({ "chainId": chain_id }));
        }
    }

    fn clear_accounts(&self) {
        let had_accounts = self
            .cache
            .write()
            .accounts
            .take()
            .is_some_and(|accounts| !accounts.is_empty());
        if had_accounts {
            debug!("cleared cached accounts after revocation");
            self.emit(EventKind::AccountsChanged, json!([]));
        }
    }

    fn emit(&self, kind: EventKind, data: Value) {
        let _ = self.events.send(EventMessage::new(kind, data));
    }
}

fn parse_chain_id(hex: &str) -> Option<u64> {
    let digits = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

fn parse_accounts(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
