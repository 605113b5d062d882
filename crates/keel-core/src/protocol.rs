//! Envelope protocol shared by the page, relay, and background contexts.
//!
//! Every message crossing a context boundary is an [`Envelope`], a closed
//! union tagged by its `type` field:
//!
//! | `type`               | Payload             |
//! |----------------------|---------------------|
//! | `REQUEST`            | [`RequestMessage`]  |
//! | `REQUEST:DISCOVERY`  | [`RequestMessage`]  |
//! | `RESPONSE`           | [`ResponseMessage`] |
//! | `RESPONSE:DISCOVERY` | [`ResponseMessage`] |
//! | `EVENT`              | [`EventMessage`]    |
//!
//! Payloads from the page are untrusted; [`Envelope::parse`] is the only
//! way raw JSON becomes an envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorObject, ProviderRpcError};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Correlation id of a request, unique and increasing per provider instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Approval context stamped onto a request by the relay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    /// Title of the requesting document.
    pub title: String,
    /// Favicon of the requesting document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Host name parsed from the requesting origin.
    pub domain: String,
    /// Method that needs approval.
    pub context: String,
    /// Human-readable summary shown in the approval prompt.
    pub message: String,
}

/// A provider request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Correlation id.
    pub id: RequestId,
    /// JSON-RPC method name.
    pub method: String,
    /// Positional parameters (usually an array).
    #[serde(default)]
    pub params: Value,
    /// Origin of the requesting document, stamped by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Whether the background must prompt before executing.
    #[serde(default)]
    pub requires_approval: bool,
    /// Approval context, present when `requires_approval` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

impl RequestMessage {
    /// Create a request with no origin or approval data.
    pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            origin: None,
            requires_approval: false,
            metadata: None,
        }
    }

    /// Parameters as a slice; non-array params read as empty.
    pub fn params_array(&self) -> &[Value] {
        match &self.params {
            Value::Array(items) => items,
            _ => &[],
        }
    }
}

/// A response correlated to exactly one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Success value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure value. Takes precedence over `result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl ResponseMessage {
    /// Successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response.
    pub fn failure(id: RequestId, error: impl Into<ErrorObject>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Whether this response carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into the caller-facing outcome. A missing result reads as `null`.
    pub fn into_result(self) -> Result<Value, ProviderRpcError> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Provider event names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Active chain changed; data is the hex chain id.
    ChainChanged,
    /// Exposed accounts changed; data is the account list.
    AccountsChanged,
    /// Provider became able to serve requests; data is `{chainId}`.
    Connect,
    /// Provider lost its connection; data is an error object.
    Disconnect,
    /// Free-form message; data is `{type, data}`.
    Message,
    /// Legacy decimal network id; data is the decimal string.
    NetworkChanged,
}

impl EventKind {
    /// Event name as emitted to page code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChainChanged => "chainChanged",
            Self::AccountsChanged => "accountsChanged",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Message => "message",
            Self::NetworkChanged => "networkChanged",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An out-of-band provider event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event name.
    pub event: EventKind,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl EventMessage {
    /// Create an event.
    pub fn new(event: EventKind, data: Value) -> Self {
        Self { event, data }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Tagged union of every message crossing a context boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Request on the legacy channel.
    #[serde(rename = "REQUEST")]
    Request(RequestMessage),
    /// Request on the discovery channel.
    #[serde(rename = "REQUEST:DISCOVERY")]
    DiscoveryRequest(RequestMessage),
    /// Response on the legacy channel.
    #[serde(rename = "RESPONSE")]
    Response(ResponseMessage),
    /// Response on the discovery channel.
    #[serde(rename = "RESPONSE:DISCOVERY")]
    DiscoveryResponse(ResponseMessage),
    /// Provider event.
    #[serde(rename = "EVENT")]
    Event(EventMessage),
}

impl Envelope {
    /// Validate untrusted JSON into an envelope.
    pub fn parse(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Build the response envelope matching a request's channel.
    pub fn response(discovery: bool, response: ResponseMessage) -> Self {
        if discovery {
            Self::DiscoveryResponse(response)
        } else {
            Self::Response(response)
        }
    }

    /// Wire tag of this envelope.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Request(_) => "REQUEST",
            Self::DiscoveryRequest(_) => "REQUEST:DISCOVERY",
            Self::Response(_) => "RESPONSE",
            Self::DiscoveryResponse(_) => "RESPONSE:DISCOVERY",
            Self::Event(_) => "EVENT",
        }
    }

    /// Correlation id, if the envelope carries one.
    pub fn id(&self) -> Option<RequestId> {
        match self {
            Self::Request(r) | Self::DiscoveryRequest(r) => Some(r.id),
            Self::Response(r) | Self::DiscoveryResponse(r) => Some(r.id),
            Self::Event(_) => None,
        }
    }

    /// Whether the envelope belongs to the discovery channel.
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::DiscoveryRequest(_) | Self::DiscoveryResponse(_))
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
