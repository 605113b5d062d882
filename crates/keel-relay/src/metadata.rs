//! Approval metadata stamping.

use keel_core::{ProviderRpcError, RequestMessage, RequestMetadata};
use serde_json::Value;

use crate::page::TabInfo;

const CONNECT_MESSAGE: &str = "This site wants to connect to one or more of your accounts.";
const APPROVE_MESSAGE: &str =
    "This site wants you to approve a transaction or sign a message. Review it carefully.";

/// Methods the background must prompt for.
pub fn requires_approval(method: &str) -> bool {
    matches!(
        method,
        "eth_requestAccounts"
            | "wallet_requestPermissions"
            | "wallet_switchEthereumChain"
            | "wallet_addEthereumChain"
            | "eth_sendTransaction"
            | "eth_signTransaction"
            | "eth_sign"
            | "personal_sign"
            | "eth_signTypedData"
            | "eth_signTypedData_v3"
            | "eth_signTypedData_v4"
    )
}

/// Host name of `origin`, if it has one.
pub fn parse_domain(origin: &str) -> Option<String> {
    let url = url::Url::parse(origin).ok()?;
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

/// Stamp `request` with its origin and, for approval methods, the prompt
/// metadata. Approval fields sent by the page are discarded first. Fails when
/// no domain can be parsed from `origin`.
pub fn stamp_request(
    request: &mut RequestMessage,
    origin: &str,
    tab: &TabInfo,
) -> Result<(), ProviderRpcError> {
    let domain = parse_domain(origin).ok_or_else(|| {
        ProviderRpcError::invalid_params(format!(
            "Domain name is not valid for origin {origin:?}; the page address may be malformed"
        ))
    })?;

    request.origin = Some(origin.to_string());
    request.requires_approval = false;
    request.metadata = None;
    if request.params.is_null() {
        request.params = Value::Array(Vec::new());
    }
    if requires_approval(&request.method) {
        let message = match request.method.as_str() {
            "eth_requestAccounts" | "wallet_requestPermissions" => CONNECT_MESSAGE,
            _ => APPROVE_MESSAGE,
        };
        request.requires_approval = true;
        request.metadata = Some(RequestMetadata {
            title: tab.title.clone(),
            icon: tab.icon.clone(),
            domain,
            context: request.method.clone(),
            message: message.to_string(),
        });
    }
    Ok(())
}
