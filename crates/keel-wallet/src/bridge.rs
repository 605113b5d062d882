//! Glue between the page-side facade and the relay.

use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Envelope, ProviderRpcError};
use keel_provider::{ProviderFacade, Transport};
use keel_relay::{ContentRelay, PageMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Posts facade envelopes to the relay as same-origin page messages.
pub struct RelayTransport {
    relay: Arc<ContentRelay>,
    origin: String,
}

impl RelayTransport {
    /// Transport for a page at `origin`.
    pub fn new(relay: Arc<ContentRelay>, origin: impl Into<String>) -> Self {
        Self {
            relay,
            origin: origin.into(),
        }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn post(&self, envelope: Envelope) -> Result<(), ProviderRpcError> {
        let message = PageMessage {
            origin: self.origin.clone(),
            data: envelope.to_value(),
        };
        self.relay.handle_page_message(message).await.map_err(|e| {
            warn!(error = %e, "relay refused page message");
            ProviderRpcError::internal(e.to_string())
        })
    }
}

/// Feed everything posted to the page window into `facade`.
pub fn spawn_window_pump(
    mut window_rx: mpsc::UnboundedReceiver<Value>,
    facade: Arc<ProviderFacade>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                message = window_rx.recv() => match message {
                    Some(message) => facade.handle_message(&message),
                    None => break,
                },
            }
        }
        debug!("window pump stopped");
    })
}
