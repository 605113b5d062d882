//! In-process background endpoint.
//!
//! [`BackgroundHub`] is the peer every other context connects to. Provider
//! channels (`keel-legacy`, `keel-discovery`) carry requests to the
//! [`RequestDispatcher`] and receive its provider events; role channels
//! (`ui-connection`, `popup-connection`, `content-connection`) are admitted
//! into the [`ConnectionManager`]. Any other name is refused and left to
//! whichever subsystem owns it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use keel_core::{ChannelError, ChannelName, Connector, Envelope, EventMessage, Port, port_pair};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::connection::{ConnectionId, Role};
use crate::dispatcher::RequestDispatcher;
use crate::manager::ConnectionManager;
use crate::queue::MAX_QUEUE_SIZE;

/// Serves every background channel.
pub struct BackgroundHub {
    dispatcher: Arc<RequestDispatcher>,
    manager: Arc<ConnectionManager>,
    capacity: usize,
    available: AtomicBool,
}

impl BackgroundHub {
    /// Create a hub whose channels buffer `capacity` messages per direction.
    pub fn new(dispatcher: Arc<RequestDispatcher>, manager: Arc<ConnectionManager>, capacity: usize) -> Self {
        Self {
            dispatcher,
            manager,
            capacity: capacity.max(1),
            available: AtomicBool::new(true),
        }
    }

    /// Request dispatcher.
    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    /// Connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Accept or refuse new channels, e.g. while the background restarts.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for BackgroundHub {
    async fn connect(&self, name: &str) -> Result<Port<Envelope>, ChannelError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable(name.to_string()));
        }
        let Some(channel) = ChannelName::parse(name) else {
            debug!(name, "ignoring unrecognized channel");
            return Err(ChannelError::Unrecognized(name.to_string()));
        };

        if let Some(role) = Role::from_channel(name) {
            let (local, remote) = port_pair::<Envelope>(name, self.capacity.max(MAX_QUEUE_SIZE));
            let (tx, rx) = local.split();
            let id = self.manager.admit(role, tx.clone()).await;
            let _ = tokio::spawn(serve_role(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.manager),
                role,
                id,
                tx,
                rx,
            ));
            return Ok(remote);
        }

        let (local, remote) = port_pair::<Envelope>(name, self.capacity);
        let events = self.dispatcher.subscribe();
        info!(%channel, "provider channel opened");
        let _ = tokio::spawn(serve_provider(Arc::clone(&self.dispatcher), channel, local, events));
        Ok(remote)
    }
}

fn handle_inbound(dispatcher: &Arc<RequestDispatcher>, tx: &mpsc::Sender<Envelope>, envelope: Envelope) {
    let (discovery, request) = match envelope {
        Envelope::Request(request) => (false, request),
        Envelope::DiscoveryRequest(request) => (true, request),
        other => {
            debug!(kind = other.type_tag(), "ignoring non-request envelope");
            return;
        }
    };
    let dispatcher = Arc::clone(dispatcher);
    let tx = tx.clone();
    let _ = tokio::spawn(async move {
        let id = request.id;
        let response = dispatcher.respond(&request).await;
        if tx.send(Envelope::response(discovery, response)).await.is_err() {
            debug!(id = id.0, "requester gone before response");
        }
    });
}

async fn serve_provider(
    dispatcher: Arc<RequestDispatcher>,
    channel: ChannelName,
    port: Port<Envelope>,
    mut events: broadcast::Receiver<EventMessage>,
) {
    let (tx, mut rx) = port.split();
    loop {
        tokio::select! {
            inbound = rx.recv() => {
                let Some(envelope) = inbound else { break };
                handle_inbound(&dispatcher, &tx, envelope);
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if tx.send(Envelope::Event(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%channel, skipped, "provider channel fell behind on events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    info!(%channel, "provider channel closed");
}

async fn serve_role(
    dispatcher: Arc<RequestDispatcher>,
    manager: Arc<ConnectionManager>,
    role: Role,
    id: ConnectionId,
    tx: mpsc::Sender<Envelope>,
    mut rx: mpsc::Receiver<Envelope>,
) {
    while let Some(envelope) = rx.recv().await {
        handle_inbound(&dispatcher, &tx, envelope);
    }
    let _ = manager.remove(role, id);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
