//! # keel-core
//!
//! Shared vocabulary for the Keel wallet relay.
//!
//! Every other Keel crate depends on the types defined here:
//!
//! - **Envelopes**: [`Envelope`], the closed tagged union carried between the
//!   page, relay, and background contexts
//! - **Errors**: [`ProviderRpcError`] with its [`ErrorKind`] taxonomy and numeric codes
//! - **Retry**: [`RetryPolicy`] and the [`retry()`] combinator
//! - **Channels**: typed duplex [`Port`]s and the [`Connector`] seam
//! - **Time**: the injectable [`Clock`]

#![deny(unsafe_code)]

pub mod channel;
pub mod clock;
pub mod errors;
pub mod logging;
pub mod protocol;
pub mod retry;

pub use channel::{ChannelError, ChannelName, Connector, Port, port_pair};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ErrorKind, ErrorObject, ProviderRpcError};
pub use protocol::{
    Envelope, EventKind, EventMessage, RequestId, RequestMessage, RequestMetadata,
    ResponseMessage,
};
pub use retry::{BackoffClass, RetryDecision, RetryPolicy, Retryable, retry};
