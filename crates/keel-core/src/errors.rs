//! Page-facing error taxonomy.
//!
//! Every failure delivered to page code is a structured [`ErrorObject`]
//! carrying a numeric code. [`ProviderRpcError`] is its typed form, with the
//! [`ErrorKind`] recovered from the code.
//!
//! | Kind                    | Code    |
//! |-------------------------|---------|
//! | `UserRejected`          | 4001    |
//! | `PermissionDenied`      | 4100    |
//! | `AuthRequired`          | 4102    |
//! | `TokenInvalidOrExpired` | 4104    |
//! | `UnknownMethod`         | 4200    |
//! | `Disconnected`          | 4900    |
//! | `ProtocolTimeout`       | 4902    |
//! | `FrameBlocked`          | 4903    |
//! | `InvalidParams`         | -32602  |
//! | `Internal`              | -32603  |
//! | `TransportFailure`      | -32000  |
//! | `RateLimited`           | -32005  |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a page-facing failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The user declined an approval prompt.
    UserRejected,
    /// The origin lacks a permission grant for the method.
    PermissionDenied,
    /// The wallet is locked, uninitialized, or has no live session.
    AuthRequired,
    /// A bearer token failed verification or has expired.
    TokenInvalidOrExpired,
    /// The method is in neither the public nor the protected set.
    UnknownMethod,
    /// The channel to the background is gone.
    Disconnected,
    /// No response arrived within the request window.
    ProtocolTimeout,
    /// The target frame stayed unreachable through every retry.
    FrameBlocked,
    /// Parameters failed structural validation.
    InvalidParams,
    /// Unclassified failure.
    Internal,
    /// A vendor call failed after retries.
    TransportFailure,
    /// A vendor kept rate-limiting after retries.
    RateLimited,
}

impl ErrorKind {
    /// Numeric code delivered to the page.
    pub fn code(self) -> i64 {
        match self {
            Self::UserRejected => 4001,
            Self::PermissionDenied => 4100,
            Self::AuthRequired => 4102,
            Self::TokenInvalidOrExpired => 4104,
            Self::UnknownMethod => 4200,
            Self::Disconnected => 4900,
            Self::ProtocolTimeout => 4902,
            Self::FrameBlocked => 4903,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
            Self::TransportFailure => -32000,
            Self::RateLimited => -32005,
        }
    }

    /// Recover the kind from a numeric code. Unknown codes map to `Internal`.
    pub fn from_code(code: i64) -> Self {
        match code {
            4001 => Self::UserRejected,
            4100 => Self::PermissionDenied,
            4102 => Self::AuthRequired,
            4104 => Self::TokenInvalidOrExpired,
            4200 => Self::UnknownMethod,
            4900 => Self::Disconnected,
            4902 => Self::ProtocolTimeout,
            4903 => Self::FrameBlocked,
            -32602 => Self::InvalidParams,
            -32000 => Self::TransportFailure,
            -32005 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Wire form of an error, as carried in a response envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Numeric code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Typed page-facing error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct ProviderRpcError {
    /// Classification.
    pub kind: ErrorKind,
    /// Numeric code (normally `kind.code()`, preserved verbatim from the wire).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    pub data: Option<Value>,
}

impl ProviderRpcError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The user declined.
    pub fn user_rejected() -> Self {
        Self::new(ErrorKind::UserRejected, "User rejected the request")
    }

    /// No response within the request window.
    pub fn timeout(method: &str) -> Self {
        Self::new(ErrorKind::ProtocolTimeout, format!("Request timed out: {method}"))
    }

    /// The channel to the background is unavailable.
    pub fn disconnected() -> Self {
        Self::new(ErrorKind::Disconnected, "Provider is disconnected")
    }

    /// The target frame could not be reached.
    pub fn frame_blocked() -> Self {
        Self::new(ErrorKind::FrameBlocked, "Frame blocked by Content Security Policy")
    }

    /// The method is not recognized.
    pub fn unknown_method(method: &str) -> Self {
        Self::new(ErrorKind::UnknownMethod, format!("Unsupported method: {method}"))
    }

    /// Structural parameter failure.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    /// Unclassified failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<ErrorObject> for ProviderRpcError {
    fn from(obj: ErrorObject) -> Self {
        Self {
            kind: ErrorKind::from_code(obj.code),
            code: obj.code,
            message: obj.message,
            data: obj.data,
        }
    }
}

impl From<ProviderRpcError> for ErrorObject {
    fn from(err: ProviderRpcError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
