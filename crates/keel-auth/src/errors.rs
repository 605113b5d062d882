//! Auth error types.

use keel_core::{ErrorKind, ProviderRpcError};
use keel_store::StoreError;

/// Errors raised by session and token operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token signature, session binding, or expiry check failed.
    #[error("token invalid or expired: {0}")]
    TokenInvalidOrExpired(String),

    /// Token could not be encoded.
    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    /// The operation needs a live session.
    #[error("no active session")]
    NoSession,

    /// The operation is an extension point with no implementation.
    #[error("{0} is not available")]
    NotAvailable(&'static str),

    /// Durable storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// Page-facing classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenInvalidOrExpired(_) => ErrorKind::TokenInvalidOrExpired,
            Self::NoSession => ErrorKind::AuthRequired,
            Self::NotAvailable(_) => ErrorKind::UnknownMethod,
            Self::Encoding(_) | Self::Store(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

impl From<AuthError> for ProviderRpcError {
    fn from(err: AuthError) -> Self {
        ProviderRpcError::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_available_display() {
        let err = AuthError::NotAvailable("token refresh");
        assert_eq!(err.to_string(), "token refresh is not available");
    }

    #[test]
    fn token_error_maps_to_taxonomy() {
        let err: ProviderRpcError = AuthError::TokenInvalidOrExpired("expired".into()).into();
        assert_eq!(err.kind, ErrorKind::TokenInvalidOrExpired);
        assert_eq!(err.code, 4104);
    }

    #[test]
    fn no_session_is_auth_required() {
        assert_eq!(AuthError::NoSession.kind(), ErrorKind::AuthRequired);
    }
}
