//! Page-side messaging seam.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::frame::FrameSnapshot;

/// A message posted by page code, as received by the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    /// Origin the browser attributes to the sender.
    pub origin: String,
    /// Untrusted payload.
    pub data: Value,
}

/// Display details of the hosting tab.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Document title.
    pub title: String,
    /// Favicon URL.
    pub icon: Option<String>,
}

/// The window replies are posted to.
pub trait PageWindow: Send + Sync {
    /// Inspect the window. `None` if inspection failed.
    fn snapshot(&self) -> Option<FrameSnapshot>;
    /// Post `message`. Callers check accessibility first.
    fn post(&self, message: Value);
    /// Title and icon of the hosting tab.
    fn tab_info(&self) -> TabInfo;
}

/// [`PageWindow`] that forwards posts into a channel.
#[derive(Debug)]
pub struct WindowHandle {
    tx: mpsc::UnboundedSender<Value>,
    frame: Mutex<Option<FrameSnapshot>>,
    tab: TabInfo,
}

impl WindowHandle {
    /// Accessible window at `origin`, plus the receiver of everything posted
    /// to it.
    pub fn new(origin: &str, tab: TabInfo) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                frame: Mutex::new(Some(FrameSnapshot::same_as(origin))),
                tab,
            },
            rx,
        )
    }

    /// Change what [`PageWindow::snapshot`] reports.
    pub fn set_frame(&self, frame: Option<FrameSnapshot>) {
        *self.frame.lock() = frame;
    }
}

impl PageWindow for WindowHandle {
    fn snapshot(&self) -> Option<FrameSnapshot> {
        self.frame.lock().clone()
    }

    fn post(&self, message: Value) {
        let _ = self.tx.send(message);
    }

    fn tab_info(&self) -> TabInfo {
        self.tab.clone()
    }
}
