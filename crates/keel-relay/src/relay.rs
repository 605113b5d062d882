//! The content relay.
//!
//! Two independent lanes connect the page to the background:
//!
//! - **legacy**: opened on the first outbound request and reopened lazily on
//!   the next request after it drops; never more than one
//! - **discovery**: opened eagerly by [`ContentRelay::start`]; when it drops
//!   a reconnect cycle sleeps through `discovery_backoff` (1 s, then 2 s)
//!   attempting after each delay and stopping at the first success. A cycle
//!   that runs out gives up until the periodic health check starts another.
//!
//! Replies are posted only to an accessible page frame. A discovery response
//! for a blocked frame is held and retried with linearly growing delays;
//! once the attempts are spent the page gets a frame-blocked error in its
//! place.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use keel_core::channel::{DISCOVERY_CHANNEL, LEGACY_CHANNEL};
use keel_core::{ChannelError, Connector, Envelope, ProviderRpcError, RequestId, ResponseMessage};
use keel_settings::RelaySettings;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::RelayError;
use crate::frame::{FrameAccess, classify};
use crate::metadata::stamp_request;
use crate::page::{PageMessage, PageWindow};

/// Relay timing and policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// Origin of the hosting document.
    pub document_origin: String,
    /// Open the discovery lane at all.
    pub use_discovery: bool,
    /// Delays before each reconnect attempt within one cycle.
    pub discovery_backoff: Vec<Duration>,
    /// Period of the discovery health check.
    pub health_check_interval: Duration,
    /// Redelivery attempts for a blocked discovery response.
    pub blocked_retry_attempts: u32,
    /// Delay unit for blocked redelivery; attempt `n` waits `n × base`.
    pub blocked_retry_base: Duration,
}

impl RelayConfig {
    /// Defaults for a document at `document_origin`.
    pub fn new(document_origin: impl Into<String>) -> Self {
        Self::from_settings(&RelaySettings::default(), true, document_origin)
    }

    /// Build from settings.
    pub fn from_settings(
        settings: &RelaySettings,
        use_discovery: bool,
        document_origin: impl Into<String>,
    ) -> Self {
        Self {
            document_origin: document_origin.into(),
            use_discovery,
            discovery_backoff: settings
                .discovery_backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            health_check_interval: Duration::from_millis(settings.health_check_interval_ms.max(1)),
            blocked_retry_attempts: settings.blocked_retry_attempts,
            blocked_retry_base: Duration::from_millis(settings.blocked_retry_base_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lane {
    Legacy,
    Discovery,
}

impl Lane {
    fn channel(self) -> &'static str {
        match self {
            Self::Legacy => LEGACY_CHANNEL,
            Self::Discovery => DISCOVERY_CHANNEL,
        }
    }
}

struct Link {
    tx: mpsc::Sender<Envelope>,
    generation: u64,
}

impl Link {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Bridges one page to the background.
pub struct ContentRelay {
    config: RelayConfig,
    connector: Arc<dyn Connector>,
    page: Arc<dyn PageWindow>,
    legacy: Mutex<Option<Link>>,
    discovery: Mutex<Option<Link>>,
    generation: AtomicU64,
    reconnecting: AtomicBool,
    cancel: CancellationToken,
}

impl ContentRelay {
    /// Create a relay with no open channels.
    pub fn new(config: RelayConfig, connector: Arc<dyn Connector>, page: Arc<dyn PageWindow>) -> Self {
        Self {
            config,
            connector,
            page,
            legacy: Mutex::new(None),
            discovery: Mutex::new(None),
            generation: AtomicU64::new(0),
            reconnecting: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Open the discovery lane and start its health check. The returned task
    /// ends on [`shutdown`](Self::shutdown).
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        if self.config.use_discovery {
            if let Err(e) = self.open_discovery().await {
                warn!(error = %e, "discovery channel unavailable at start");
                self.spawn_reconnect();
            }
        }
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_health_check().await })
    }

    /// Stop background tasks. Open channels close as their pumps exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the legacy lane is open.
    pub async fn has_legacy(&self) -> bool {
        self.legacy.lock().await.as_ref().is_some_and(Link::is_open)
    }

    /// Whether the discovery lane is open.
    pub async fn has_discovery(&self) -> bool {
        self.discovery.lock().await.as_ref().is_some_and(Link::is_open)
    }

    /// Accessibility of the page frame right now.
    pub fn frame_access(&self) -> FrameAccess {
        classify(self.page.snapshot().as_ref(), &self.config.document_origin)
    }

    /// Accept a page message and forward it. Errors mean the message was
    /// ignored; failures of accepted requests are answered to the page.
    pub async fn handle_page_message(self: &Arc<Self>, message: PageMessage) -> Result<(), RelayError> {
        if message.origin != self.config.document_origin {
            return Err(RelayError::OriginMismatch {
                expected: self.config.document_origin.clone(),
                actual: message.origin,
            });
        }

        let (lane, mut request) = match Envelope::parse(&message.data)? {
            Envelope::Request(request) => (Lane::Legacy, request),
            Envelope::DiscoveryRequest(request) => (Lane::Discovery, request),
            other => return Err(RelayError::UnexpectedEnvelope(other.type_tag())),
        };

        if let Err(e) = stamp_request(&mut request, &message.origin, &self.page.tab_info()) {
            warn!(id = request.id.0, method = %request.method, error = %e.message, "rejecting request");
            self.reply_error(lane, request.id, e);
            return Ok(());
        }

        let id = request.id;
        debug!(id = id.0, method = %request.method, ?lane, "forwarding request");
        let sent = match lane {
            Lane::Legacy => self.send_legacy(Envelope::Request(request)).await,
            Lane::Discovery => self.send_discovery(Envelope::DiscoveryRequest(request)).await,
        };
        if let Err(e) = sent {
            warn!(id = id.0, ?lane, error = %e, "background unreachable");
            self.reply_error(lane, id, ProviderRpcError::disconnected());
        }
        Ok(())
    }

    // ── Lanes ──────────────────────────────────────────────────────────────

    async fn open(self: &Arc<Self>, lane: Lane) -> Result<Link, ChannelError> {
        let port = self.connector.connect(lane.channel()).await?;
        let (tx, rx) = port.split();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(?lane, generation, "background channel opened");
        let _ = tokio::spawn(Arc::clone(self).pump(lane, generation, rx));
        Ok(Link { tx, generation })
    }

    async fn send_legacy(self: &Arc<Self>, envelope: Envelope) -> Result<(), ChannelError> {
        let tx = {
            let mut slot = self.legacy.lock().await;
            match slot.as_ref() {
                Some(link) if link.is_open() => link.tx.clone(),
                _ => {
                    let link = self.open(Lane::Legacy).await?;
                    let tx = link.tx.clone();
                    *slot = Some(link);
                    tx
                }
            }
        };
        tx.send(envelope).await.map_err(|_| ChannelError::Closed)
    }

    async fn send_discovery(self: &Arc<Self>, envelope: Envelope) -> Result<(), ChannelError> {
        let tx = self
            .discovery
            .lock()
            .await
            .as_ref()
            .filter(|link| link.is_open())
            .map(|link| link.tx.clone());
        match tx {
            Some(tx) => tx.send(envelope).await.map_err(|_| ChannelError::Closed),
            None => {
                self.spawn_reconnect();
                Err(ChannelError::Unavailable(DISCOVERY_CHANNEL.to_string()))
            }
        }
    }

    async fn open_discovery(self: &Arc<Self>) -> Result<(), ChannelError> {
        let mut slot = self.discovery.lock().await;
        if slot.as_ref().is_some_and(Link::is_open) {
            return Ok(());
        }
        *slot = Some(self.open(Lane::Discovery).await?);
        Ok(())
    }

    async fn pump(self: Arc<Self>, lane: Lane, generation: u64, mut rx: mpsc::Receiver<Envelope>) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                inbound = rx.recv() => match inbound {
                    Some(envelope) => self.to_page(envelope),
                    None => break,
                },
            }
        }

        let slot = match lane {
            Lane::Legacy => &self.legacy,
            Lane::Discovery => &self.discovery,
        };
        let cleared = {
            let mut slot = slot.lock().await;
            if slot.as_ref().is_some_and(|link| link.generation == generation) {
                *slot = None;
                true
            } else {
                false
            }
        };
        if cleared {
            info!(?lane, generation, "background channel disconnected");
            if lane == Lane::Discovery {
                self.spawn_reconnect();
            }
        }
    }

    // ── Reconnect ──────────────────────────────────────────────────────────

    fn spawn_reconnect(self: &Arc<Self>) {
        if !self.config.use_discovery || self.cancel.is_cancelled() {
            return;
        }
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        let _ = tokio::spawn(async move {
            let _ = this.reconnect_cycle().await;
            this.reconnecting.store(false, Ordering::SeqCst);
        });
    }

    async fn reconnect_cycle(self: &Arc<Self>) -> bool {
        for (index, delay) in self.config.discovery_backoff.iter().enumerate() {
            let attempt = index + 1;
            tokio::select! {
                () = self.cancel.cancelled() => return false,
                () = tokio::time::sleep(*delay) => {}
            }
            match self.open_discovery().await {
                Ok(()) => {
                    info!(attempt, "discovery channel reconnected");
                    return true;
                }
                Err(e) => {
                    warn!(attempt, ?delay, error = %e, "discovery reconnect failed");
                }
            }
        }
        warn!("discovery reconnect gave up until the next health check");
        false
    }

    async fn run_health_check(self: Arc<Self>) {
        if !self.config.use_discovery {
            return;
        }
        let period = self.config.health_check_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let absent = !self.has_discovery().await;
                    if absent && !self.reconnecting.load(Ordering::SeqCst) {
                        debug!("health check found discovery channel down");
                        self.spawn_reconnect();
                    }
                }
            }
        }
    }

    // ── Page delivery ──────────────────────────────────────────────────────

    fn reply_error(self: &Arc<Self>, lane: Lane, id: RequestId, error: ProviderRpcError) {
        let response = ResponseMessage::failure(id, error);
        self.to_page(Envelope::response(lane == Lane::Discovery, response));
    }

    fn to_page(self: &Arc<Self>, envelope: Envelope) {
        if matches!(envelope, Envelope::Request(_) | Envelope::DiscoveryRequest(_)) {
            debug!(kind = envelope.type_tag(), "ignoring request from background");
            return;
        }
        let access = self.frame_access();
        if access.is_accessible() {
            self.page.post(envelope.to_value());
            return;
        }
        match envelope {
            Envelope::DiscoveryResponse(response) => {
                debug!(id = response.id.0, ?access, "holding discovery response for blocked frame");
                let _ = tokio::spawn(Arc::clone(self).redeliver_blocked(response));
            }
            other => {
                warn!(kind = other.type_tag(), ?access, "dropping message for inaccessible frame");
            }
        }
    }

    async fn redeliver_blocked(self: Arc<Self>, response: ResponseMessage) {
        let attempts = self.config.blocked_retry_attempts;
        for attempt in 1..=attempts {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(self.config.blocked_retry_base * attempt) => {}
            }
            if self.frame_access().is_accessible() {
                debug!(id = response.id.0, attempt, "frame reachable, delivering held response");
                self.page.post(Envelope::DiscoveryResponse(response).to_value());
                return;
            }
        }
        warn!(id = response.id.0, attempts, "frame still blocked, failing request");
        let failure = ResponseMessage::failure(response.id, ProviderRpcError::frame_blocked());
        self.page.post(Envelope::DiscoveryResponse(failure).to_value());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
