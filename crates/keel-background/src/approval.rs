//! Approval prompt collaborator.
//!
//! The background never renders UI. Requests that need the user's consent are
//! handed to an [`ApprovalPrompt`], which answers with an [`ApprovalDecision`].

use async_trait::async_trait;
use keel_core::RequestMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the user is asked to approve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalKind {
    /// Expose accounts to an origin.
    Connect,
    /// Unlock the wallet or sign in.
    Unlock,
    /// Sign a message or typed data.
    Sign,
    /// Sign or send a transaction.
    Transaction,
    /// Switch the active chain.
    SwitchChain,
    /// Register a new chain.
    AddChain,
    /// Anything else the relay flagged as requiring approval.
    Generic,
}

impl ApprovalKind {
    /// Prompt kind for a method that needs consent, or `None` if it does not.
    pub fn for_method(method: &str) -> Option<Self> {
        match method {
            "eth_requestAccounts" | "wallet_requestPermissions" => Some(Self::Connect),
            "eth_sign" | "personal_sign" | "eth_signTypedData" | "eth_signTypedData_v3"
            | "eth_signTypedData_v4" => Some(Self::Sign),
            "eth_sendTransaction" | "eth_signTransaction" => Some(Self::Transaction),
            "wallet_switchEthereumChain" => Some(Self::SwitchChain),
            "wallet_addEthereumChain" => Some(Self::AddChain),
            _ => None,
        }
    }
}

/// A consent request shown to the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Prompt kind.
    pub kind: ApprovalKind,
    /// RPC method.
    pub method: String,
    /// RPC params.
    pub params: Value,
    /// Requesting origin.
    pub origin: String,
    /// Host name derived from `origin`.
    pub domain: String,
    /// Display metadata stamped by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

/// The user's answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Proceed.
    Approved,
    /// Abort with a user-rejected error.
    Rejected,
}

/// Shows consent prompts.
#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    /// Ask the user and wait for the answer.
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Prompt that always gives the same answer.
#[derive(Clone, Copy, Debug)]
pub struct StaticApproval(pub ApprovalDecision);

impl StaticApproval {
    /// Approve everything.
    pub fn approve_all() -> Self {
        Self(ApprovalDecision::Approved)
    }

    /// Reject everything.
    pub fn reject_all() -> Self {
        Self(ApprovalDecision::Rejected)
    }
}

#[async_trait]
impl ApprovalPrompt for StaticApproval {
    async fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        self.0
    }
}
