//! Relay error types.

use keel_core::ChannelError;

/// Reasons a page message was not forwarded.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Sender origin differs from the hosting document.
    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch {
        /// Hosting document origin.
        expected: String,
        /// Origin the message claimed.
        actual: String,
    },

    /// Payload is not a valid envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope kind the page may not send.
    #[error("unexpected {0} envelope from page")]
    UnexpectedEnvelope(&'static str),

    /// Background channel failure.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
