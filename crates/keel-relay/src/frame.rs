//! Frame accessibility classification.
//!
//! Outbound messages go only to frames classified [`FrameAccess::Accessible`].

use serde::{Deserialize, Serialize};

/// Whether a window can safely receive a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameAccess {
    /// Same origin, attached, not sandboxed.
    Accessible,
    /// Opaque `null` origin.
    NullOrigin,
    /// Different origin than the hosting document.
    CrossOrigin,
    /// Sandboxed frame.
    Sandboxed,
    /// Detached from its document.
    Disconnected,
    /// The window could not be inspected.
    UnknownError,
}

impl FrameAccess {
    /// Whether messages may be posted.
    pub fn is_accessible(self) -> bool {
        self == Self::Accessible
    }
}

/// What could be observed about a target window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSnapshot {
    /// Serialized origin, `None` if unreadable.
    pub origin: Option<String>,
    /// Frame carries a `sandbox` attribute.
    pub sandboxed: bool,
    /// Frame is still attached.
    pub attached: bool,
}

impl FrameSnapshot {
    /// An attached, unsandboxed frame at `origin`.
    pub fn same_as(origin: &str) -> Self {
        Self {
            origin: Some(origin.to_string()),
            sandboxed: false,
            attached: true,
        }
    }
}

/// Classify `frame` against the hosting document's origin. `None` means the
/// window could not be inspected at all.
pub fn classify(frame: Option<&FrameSnapshot>, document_origin: &str) -> FrameAccess {
    let Some(frame) = frame else {
        return FrameAccess::UnknownError;
    };
    if !frame.attached {
        return FrameAccess::Disconnected;
    }
    if frame.sandboxed {
        return FrameAccess::Sandboxed;
    }
    match frame.origin.as_deref() {
        None | Some("null") => FrameAccess::NullOrigin,
        Some(origin) if origin != document_origin => FrameAccess::CrossOrigin,
        Some(_) => FrameAccess::Accessible,
    }
}
