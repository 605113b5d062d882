//! Role-bound connection state.

use std::fmt;

use keel_core::{ChannelName, Envelope};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Roles the connection manager tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Extension UI.
    Ui,
    /// Popup window.
    Popup,
    /// Content context.
    Content,
}

impl Role {
    /// Role served on `name`, or `None` for channels owned elsewhere.
    pub fn from_channel(name: &str) -> Option<Self> {
        match ChannelName::parse(name)? {
            ChannelName::Ui => Some(Self::Ui),
            ChannelName::Popup => Some(Self::Popup),
            ChannelName::Content => Some(Self::Content),
            ChannelName::Legacy | ChannelName::Discovery => None,
        }
    }

    /// Short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Popup => "popup",
            Self::Content => "content",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-unique connection id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// `Registered → Active → Removed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted, queue replay pending.
    Registered,
    /// Receiving steady-state traffic.
    Active,
    /// Disconnected or replaced.
    Removed,
}

/// A live channel to one role.
pub struct Connection {
    /// Connection id.
    pub id: ConnectionId,
    /// Role served.
    pub role: Role,
    /// Admission time, Unix milliseconds.
    pub connected_at: i64,
    tx: mpsc::Sender<Envelope>,
    state: Mutex<ConnectionState>,
}

impl Connection {
    /// Create a registered connection.
    pub fn new(id: ConnectionId, role: Role, tx: mpsc::Sender<Envelope>, connected_at: i64) -> Self {
        Self {
            id,
            role,
            connected_at,
            tx,
            state: Mutex::new(ConnectionState::Registered),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Deliver without waiting. Returns `false` if the channel is full or
    /// closed.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.tx.try_send(envelope).is_ok()
    }

    /// Whether the peer dropped its end.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{EventKind, EventMessage};
    use serde_json::Value;

    fn event() -> Envelope {
        Envelope::Event(EventMessage::new(EventKind::Message, Value::Null))
    }

    #[test]
    fn roles_from_channel_names() {
        assert_eq!(Role::from_channel("ui-connection"), Some(Role::Ui));
        assert_eq!(Role::from_channel("popup-connection"), Some(Role::Popup));
        assert_eq!(Role::from_channel("content-connection"), Some(Role::Content));
        assert_eq!(Role::from_channel("keel-legacy"), None);
        assert_eq!(Role::from_channel("devtools"), None);
    }

    #[tokio::test]
    async fn send_reports_closed_and_full() {
        let (tx, rx) = mpsc::channel(1);
        let conn = Connection::new(ConnectionId(1), Role::Ui, tx, 0);
        assert_eq!(conn.state(), ConnectionState::Registered);
        assert!(conn.send(event()));
        assert!(!conn.send(event()));
        drop(rx);
        assert!(conn.is_closed());
        assert!(!conn.send(event()));
    }
}
