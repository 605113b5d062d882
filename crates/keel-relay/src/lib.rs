//! # keel-relay
//!
//! The intermediary between an untrusted page and the background.
//!
//! [`ContentRelay`] accepts same-origin page messages, stamps them, and
//! forwards them over a lazily opened legacy channel or an eagerly opened,
//! self-healing discovery channel. Replies travel back only to frames that
//! [`classify`] as accessible; discovery responses for blocked frames are
//! held and retried before failing with a frame-blocked error.

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod metadata;
pub mod page;
pub mod relay;

pub use errors::RelayError;
pub use frame::{FrameAccess, FrameSnapshot, classify};
pub use metadata::{parse_domain, requires_approval, stamp_request};
pub use page::{PageMessage, PageWindow, TabInfo, WindowHandle};
pub use relay::{ContentRelay, RelayConfig};
