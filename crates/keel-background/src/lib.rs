//! # keel-background
//!
//! The privileged side of the relay.
//!
//! - [`ConnectionManager`]: one connection per [`Role`], broadcast delivery,
//!   and a bounded [`MessageQueue`] persisted for replay after reconnect
//! - [`RequestDispatcher`]: params → authorization → approval → execution
//! - [`BackgroundHub`]: serves the provider and role channels as a [`keel_core::Connector`]

#![deny(unsafe_code)]

pub mod approval;
pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod hub;
pub mod manager;
pub mod queue;
pub mod signer;

pub use approval::{ApprovalDecision, ApprovalKind, ApprovalPrompt, ApprovalRequest, StaticApproval};
pub use connection::{Connection, ConnectionId, ConnectionState, Role};
pub use dispatcher::{DispatcherParts, RequestDispatcher};
pub use errors::SignerError;
pub use hub::BackgroundHub;
pub use manager::ConnectionManager;
pub use queue::{MAX_QUEUE_SIZE, MessageQueue, QUEUE_KEY, QueuedMessage, snapshot_key};
pub use signer::{Signer, UnavailableSigner};
