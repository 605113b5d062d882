//! Typed duplex channels between contexts.
//!
//! A [`Port`] is one end of a named, bidirectional, FIFO message channel,
//! modeled as an outbound sink plus an inbound source. [`port_pair`] creates
//! both ends. Components that open channels to the background do so through
//! the [`Connector`] seam so the peer can be swapped in tests.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::Envelope;

/// Channel carrying legacy provider traffic.
pub const LEGACY_CHANNEL: &str = "keel-legacy";
/// Channel carrying discovery provider traffic.
pub const DISCOVERY_CHANNEL: &str = "keel-discovery";
/// Channel opened by the extension UI.
pub const UI_CHANNEL: &str = "ui-connection";
/// Channel opened by a popup window.
pub const POPUP_CHANNEL: &str = "popup-connection";
/// Channel opened by a content context.
pub const CONTENT_CHANNEL: &str = "content-connection";

/// Every channel name the background recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Legacy provider channel.
    Legacy,
    /// Discovery provider channel.
    Discovery,
    /// Extension UI role.
    Ui,
    /// Popup role.
    Popup,
    /// Content role.
    Content,
}

impl ChannelName {
    /// Parse a raw channel name. Unrecognized names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            LEGACY_CHANNEL => Some(Self::Legacy),
            DISCOVERY_CHANNEL => Some(Self::Discovery),
            UI_CHANNEL => Some(Self::Ui),
            POPUP_CHANNEL => Some(Self::Popup),
            CONTENT_CHANNEL => Some(Self::Content),
            _ => None,
        }
    }

    /// Raw channel name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => LEGACY_CHANNEL,
            Self::Discovery => DISCOVERY_CHANNEL,
            Self::Ui => UI_CHANNEL,
            Self::Popup => POPUP_CHANNEL,
            Self::Content => CONTENT_CHANNEL,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors opening or using a channel.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The name is not served by this peer.
    #[error("unrecognized channel: {0}")]
    Unrecognized(String),
    /// The peer is not reachable (e.g. restarting).
    #[error("peer unavailable: {0}")]
    Unavailable(String),
    /// The channel was closed by the other side.
    #[error("channel closed")]
    Closed,
}

/// One end of a duplex channel.
#[derive(Debug)]
pub struct Port<T> {
    /// Channel name.
    pub name: String,
    /// Outbound sink.
    pub tx: mpsc::Sender<T>,
    /// Inbound source.
    pub rx: mpsc::Receiver<T>,
}

impl<T> Port<T> {
    /// Split into sink and source.
    pub fn split(self) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
        (self.tx, self.rx)
    }
}

/// Create both ends of a named channel. Each direction buffers `capacity` messages.
pub fn port_pair<T>(name: &str, capacity: usize) -> (Port<T>, Port<T>) {
    let (a_tx, b_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, a_rx) = mpsc::channel(capacity.max(1));
    (
        Port {
            name: name.to_string(),
            tx: a_tx,
            rx: a_rx,
        },
        Port {
            name: name.to_string(),
            tx: b_tx,
            rx: b_rx,
        },
    )
}

/// Opens envelope channels to a peer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open the channel called `name`, returning the caller's end.
    async fn connect(&self, name: &str) -> Result<Port<Envelope>, ChannelError>;
}
