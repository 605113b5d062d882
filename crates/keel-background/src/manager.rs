//! Connection tracking, broadcast delivery, and the undelivered-message queue.
//!
//! At most one connection is active per [`Role`]; admitting a second one for
//! the same role replaces the first. [`ConnectionManager::send_message`]
//! broadcasts to every active connection, delivering to each independently.
//! When there is no connection, or every delivery fails, the message is queued
//! and the queue persisted. Admission drains the queue to the new connection
//! before it is marked active, and a delivery gate keeps steady-state sends
//! from overtaking that replay.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use keel_auth::SessionBroadcaster;
use keel_core::{Clock, Envelope};
use keel_store::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionId, ConnectionState, Role};
use crate::queue::{MessageQueue, QUEUE_KEY, QueuedMessage, snapshot_key};

/// Tracks role connections and queues what cannot be delivered.
pub struct ConnectionManager {
    connections: RwLock<HashMap<Role, Arc<Connection>>>,
    queue: Mutex<MessageQueue>,
    delivery: tokio::sync::Mutex<()>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager with no connections and an empty queue.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            queue: Mutex::new(MessageQueue::new()),
            delivery: tokio::sync::Mutex::new(()),
            store,
            clock,
            next_id: AtomicU64::new(0),
        }
    }

    /// Load the persisted queue, discarding it if malformed. Returns the
    /// number of restored messages.
    pub async fn restore(&self) -> usize {
        let snapshot = match self.store.get(QUEUE_KEY).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to read persisted queue");
                None
            }
        };
        let queue = MessageQueue::restore(snapshot.as_ref());
        let restored = queue.len();
        *self.queue.lock() = queue;
        if restored > 0 {
            info!(restored, "restored message queue");
        }
        restored
    }

    /// Admit a connection for `role`, replay the queue to it, then mark it
    /// active.
    pub async fn admit(&self, role: Role, tx: mpsc::Sender<Envelope>) -> ConnectionId {
        let _gate = self.delivery.lock().await;
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let connection = Arc::new(Connection::new(id, role, tx, self.clock.now_ms()));

        let replaced = self.connections.write().insert(role, Arc::clone(&connection));
        if let Some(old) = replaced {
            old.set_state(ConnectionState::Removed);
            debug!(%role, old = %old.id, new = %id, "connection replaced");
        }
        info!(%role, conn_id = %id, "connection admitted");

        let _ = self.replay().await;
        connection.set_state(ConnectionState::Active);
        id
    }

    /// Remove the connection `id` if it still holds `role`.
    pub fn remove(&self, role: Role, id: ConnectionId) -> bool {
        let removed = {
            let mut connections = self.connections.write();
            match connections.get(&role) {
                Some(c) if c.id == id => connections.remove(&role),
                _ => None,
            }
        };
        match removed {
            Some(connection) => {
                connection.set_state(ConnectionState::Removed);
                info!(%role, conn_id = %id, "connection removed");
                true
            }
            None => false,
        }
    }

    /// Broadcast to every active connection, queueing when nothing was
    /// delivered. Never fails.
    pub async fn send_message(&self, kind: &str, data: Value) {
        let _gate = self.delivery.lock().await;
        let message = QueuedMessage::new(kind, data, self.clock.now_ms());
        let connections = self.snapshot();
        if connections.is_empty() {
            debug!(kind, "no connections, queueing");
            self.enqueue(message).await;
            return;
        }
        if self.deliver(&connections, &message) == 0 {
            debug!(kind, "no delivery succeeded, queueing");
            self.enqueue(message).await;
        }
    }

    /// Drain the queue to the current connections. Returns how many messages
    /// were delivered.
    pub async fn process_queue(&self) -> usize {
        let _gate = self.delivery.lock().await;
        self.replay().await
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Connection currently holding `role`.
    pub fn connection(&self, role: Role) -> Option<Arc<Connection>> {
        self.connections.read().get(&role).cloned()
    }

    /// Number of queued messages.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Copy of the queue, oldest first.
    pub fn queued(&self) -> Vec<QueuedMessage> {
        self.queue.lock().iter().cloned().collect()
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    fn deliver(&self, connections: &[Arc<Connection>], message: &QueuedMessage) -> usize {
        let mut delivered = 0;
        for connection in connections {
            if connection.send(message.to_envelope()) {
                delivered += 1;
            } else {
                warn!(role = %connection.role, conn_id = %connection.id, kind = %message.kind, "delivery failed");
                if connection.is_closed() {
                    let _ = self.remove(connection.role, connection.id);
                }
            }
        }
        delivered
    }

    async fn replay(&self) -> usize {
        let connections = self.snapshot();
        if connections.is_empty() {
            return 0;
        }
        let pending = self.queue.lock().drain();
        if pending.is_empty() {
            return 0;
        }

        let total = pending.len();
        let mut delivered = 0;
        let mut undelivered = Vec::new();
        for message in pending {
            if self.deliver(&connections, &message) > 0 {
                delivered += 1;
            } else {
                undelivered.push(message);
            }
        }

        let snapshot = {
            let mut queue = self.queue.lock();
            for message in undelivered {
                let _ = queue.push(message);
            }
            queue.to_value()
        };
        self.persist(snapshot).await;
        info!(delivered, remaining = total - delivered, "replayed queued messages");
        delivered
    }

    async fn enqueue(&self, message: QueuedMessage) {
        let (snapshot, evicted) = {
            let mut queue = self.queue.lock();
            let evicted = queue.push(message.clone());
            (queue.to_value(), evicted)
        };
        if let Some(evicted) = evicted {
            debug!(kind = %evicted.kind, timestamp = evicted.timestamp, "queue full, evicted oldest");
        }
        self.persist(snapshot).await;

        let latest = json!({ "data": message.data, "timestamp": message.timestamp });
        if let Err(e) = self.store.set(&snapshot_key(&message.kind), latest).await {
            warn!(kind = %message.kind, error = %e, "failed to persist message snapshot");
        }
    }

    async fn persist(&self, snapshot: Value) {
        if let Err(e) = self.store.set(QUEUE_KEY, snapshot).await {
            warn!(error = %e, "failed to persist message queue");
        }
    }
}

#[async_trait]
impl SessionBroadcaster for ConnectionManager {
    async fn broadcast(&self, kind: &str, payload: Value) {
        self.send_message(kind, payload).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
