//! Inbound provider request handling.
//!
//! Every request runs the same pipeline:
//!
//! 1. structural params check ([`validate_params`])
//! 2. authorization ([`RequestAuthorizer`]); auth-class denials prompt the
//!    user to unlock and re-check once, and an unauthorized origin asking to
//!    connect is offered the connect prompt
//! 3. consent prompt for signing, sending, and chain changes
//! 4. execution against wallet state, the signer, or the RPC pool
//!
//! Failures come back as [`ProviderRpcError`]s; [`RequestDispatcher::respond`]
//! wraps either outcome into a [`ResponseMessage`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use keel_auth::{
    DenialReason, MethodClass, PermissionGrant, PermissionStore, RequestAuthorizer, classify,
    extract_domain, validate_params,
};
use keel_core::{
    Clock, ErrorKind, EventKind, EventMessage, ProviderRpcError, RequestMessage, ResponseMessage,
};
use keel_rpc::{ChainRpc, supported_chains};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::approval::{ApprovalDecision, ApprovalKind, ApprovalPrompt, ApprovalRequest};
use crate::signer::Signer;

const EVENT_CAPACITY: usize = 64;

/// Collaborators the dispatcher drives.
pub struct DispatcherParts {
    /// Method gating.
    pub authorizer: Arc<RequestAuthorizer>,
    /// Origin grants.
    pub permissions: Arc<dyn PermissionStore>,
    /// Vault.
    pub signer: Arc<dyn Signer>,
    /// Consent UI.
    pub prompt: Arc<dyn ApprovalPrompt>,
    /// Chain access.
    pub rpc: Arc<dyn ChainRpc>,
    /// Time source for grant expiry.
    pub clock: Arc<dyn Clock>,
}

/// Executes provider requests on behalf of page origins.
pub struct RequestDispatcher {
    authorizer: Arc<RequestAuthorizer>,
    permissions: Arc<dyn PermissionStore>,
    signer: Arc<dyn Signer>,
    prompt: Arc<dyn ApprovalPrompt>,
    rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    chain_id: AtomicU64,
    known_chains: RwLock<BTreeSet<u64>>,
    events: broadcast::Sender<EventMessage>,
}

fn hex_chain(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

fn parse_chain_id(param: Option<&Value>) -> Result<u64, ProviderRpcError> {
    let raw = param
        .and_then(|p| p.get("chainId"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    raw.strip_prefix("0x")
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .ok_or_else(|| ProviderRpcError::invalid_params(format!("Invalid chain id: {raw}")))
}

fn str_param(params: &[Value], index: usize) -> &str {
    params.get(index).and_then(Value::as_str).unwrap_or_default()
}

fn accounts_permission(accounts: &[String]) -> Value {
    json!({
        "parentCapability": "eth_accounts",
        "caveats": [{ "type": "restrictReturnedAccounts", "value": accounts }],
    })
}

fn is_connect(method: &str) -> bool {
    matches!(method, "eth_requestAccounts" | "wallet_requestPermissions")
}

impl RequestDispatcher {
    /// Create a dispatcher on `default_chain_id`.
    pub fn new(parts: DispatcherParts, default_chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut known: BTreeSet<u64> = supported_chains().into_iter().collect();
        let _ = known.insert(default_chain_id);
        Self {
            authorizer: parts.authorizer,
            permissions: parts.permissions,
            signer: parts.signer,
            prompt: parts.prompt,
            rpc: parts.rpc,
            clock: parts.clock,
            chain_id: AtomicU64::new(default_chain_id),
            known_chains: RwLock::new(known),
            events,
        }
    }

    /// Active chain id.
    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    /// Subscribe to provider events emitted by wallet state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<EventMessage> {
        self.events.subscribe()
    }

    /// Handle `request` and wrap the outcome.
    pub async fn respond(&self, request: &RequestMessage) -> ResponseMessage {
        match self.handle(request).await {
            Ok(result) => ResponseMessage::success(request.id, result),
            Err(e) => {
                debug!(id = request.id.0, method = %request.method, code = e.code, error = %e.message, "request failed");
                ResponseMessage::failure(request.id, e)
            }
        }
    }

    /// Run the full pipeline for `request`.
    pub async fn handle(&self, request: &RequestMessage) -> Result<Value, ProviderRpcError> {
        let method = request.method.as_str();
        validate_params(method, request.params_array())?;

        let origin = request.origin.as_deref().unwrap_or_default();
        let domain = extract_domain(origin);

        let mut validation = self.authorizer.validate(method, origin).await;
        let needs_unlock = validation
            .reason
            .is_some_and(|reason| reason.kind() == ErrorKind::AuthRequired);
        if needs_unlock
            && self.ask(ApprovalKind::Unlock, request, origin, &domain).await == ApprovalDecision::Approved
        {
            validation = self.authorizer.validate(method, origin).await;
        }

        if let Some(reason) = validation.reason {
            if reason == DenialReason::OriginNotAuthorized && is_connect(method) {
                self.connect(request, origin, &domain).await?;
                return self.execute(request, &domain).await;
            }
            return Err(reason.to_error());
        }

        let consent = match ApprovalKind::for_method(method) {
            Some(ApprovalKind::Connect) => None,
            Some(kind) => Some(kind),
            None if request.requires_approval => Some(ApprovalKind::Generic),
            None => None,
        };
        if let Some(kind) = consent {
            if self.ask(kind, request, origin, &domain).await == ApprovalDecision::Rejected {
                return Err(ProviderRpcError::user_rejected());
            }
        }

        self.execute(request, &domain).await
    }

    async fn ask(
        &self,
        kind: ApprovalKind,
        request: &RequestMessage,
        origin: &str,
        domain: &str,
    ) -> ApprovalDecision {
        let approval = ApprovalRequest {
            kind,
            method: request.method.clone(),
            params: request.params.clone(),
            origin: origin.to_string(),
            domain: domain.to_string(),
            metadata: request.metadata.clone(),
        };
        let decision = self.prompt.request_approval(&approval).await;
        debug!(?kind, method = %request.method, %domain, ?decision, "approval answered");
        decision
    }

    async fn connect(&self, request: &RequestMessage, origin: &str, domain: &str) -> Result<(), ProviderRpcError> {
        if self.ask(ApprovalKind::Connect, request, origin, domain).await == ApprovalDecision::Rejected {
            return Err(ProviderRpcError::user_rejected());
        }
        let accounts = self.signer.accounts().await?;
        self.permissions
            .grant(PermissionGrant {
                domain: domain.to_string(),
                accounts: accounts.clone(),
                expiry: None,
            })
            .await;
        info!(%domain, accounts = accounts.len(), "origin connected");
        self.emit(EventKind::AccountsChanged, json!(accounts));
        Ok(())
    }

    async fn granted_accounts(&self, domain: &str) -> Vec<String> {
        match self.permissions.get_permission(domain).await {
            Some(grant) if !grant.is_expired(self.clock.now_ms()) => grant.accounts,
            _ => Vec::new(),
        }
    }

    async fn ensure_granted(&self, domain: &str, address: &str) -> Result<(), ProviderRpcError> {
        let granted = self.granted_accounts(domain).await;
        if granted.iter().any(|a| a.eq_ignore_ascii_case(address)) {
            Ok(())
        } else {
            Err(ProviderRpcError::new(
                ErrorKind::PermissionDenied,
                "Account not authorized for this origin",
            ))
        }
    }

    fn emit(&self, event: EventKind, data: Value) {
        let _ = self.events.send(EventMessage::new(event, data));
    }

    fn switch_chain(&self, chain_id: u64) {
        let previous = self.chain_id.swap(chain_id, Ordering::SeqCst);
        if previous != chain_id {
            info!(from = previous, to = chain_id, "switched chain");
            self.emit(EventKind::ChainChanged, json!(hex_chain(chain_id)));
        }
    }

    async fn sign_transaction(&self, params: &[Value], domain: &str) -> Result<String, ProviderRpcError> {
        let transaction = params.first().cloned().unwrap_or(Value::Null);
        let from = transaction.get("from").and_then(Value::as_str).unwrap_or_default();
        self.ensure_granted(domain, from).await?;
        Ok(self.signer.sign_transaction(&transaction, self.chain_id()).await?)
    }

    async fn sign_message(
        &self,
        method: &str,
        address: &str,
        payload: &Value,
        domain: &str,
    ) -> Result<Value, ProviderRpcError> {
        self.ensure_granted(domain, address).await?;
        let signature = self.signer.sign_message(method, address, payload).await?;
        Ok(json!(signature))
    }

    async fn execute(&self, request: &RequestMessage, domain: &str) -> Result<Value, ProviderRpcError> {
        let method = request.method.as_str();
        let params = request.params_array();
        let chain_id = self.chain_id();

        match method {
            "eth_chainId" => Ok(json!(hex_chain(chain_id))),
            "net_version" => Ok(json!(chain_id.to_string())),
            "eth_accounts" | "eth_requestAccounts" => Ok(json!(self.granted_accounts(domain).await)),
            "wallet_requestPermissions" => {
                let accounts = self.granted_accounts(domain).await;
                Ok(json!([accounts_permission(&accounts)]))
            }
            "wallet_getPermissions" => {
                let accounts = self.granted_accounts(domain).await;
                if accounts.is_empty() {
                    Ok(json!([]))
                } else {
                    Ok(json!([accounts_permission(&accounts)]))
                }
            }
            "wallet_revokePermissions" => {
                if self.permissions.revoke(domain).await {
                    info!(%domain, "permissions revoked");
                }
                Ok(Value::Null)
            }
            "wallet_switchEthereumChain" => {
                let target = parse_chain_id(params.first())?;
                if !self.known_chains.read().contains(&target) {
                    return Err(ProviderRpcError::invalid_params(format!(
                        "Unrecognized chain id: {}",
                        hex_chain(target)
                    )));
                }
                self.switch_chain(target);
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let added = parse_chain_id(params.first())?;
                if self.known_chains.write().insert(added) {
                    info!(chain_id = added, "chain added");
                }
                Ok(Value::Null)
            }
            "personal_sign" => {
                let payload = params.first().cloned().unwrap_or(Value::Null);
                self.sign_message(method, str_param(params, 1), &payload, domain).await
            }
            "eth_sign" | "eth_signTypedData" | "eth_signTypedData_v3" | "eth_signTypedData_v4" => {
                let payload = params.get(1).cloned().unwrap_or(Value::Null);
                self.sign_message(method, str_param(params, 0), &payload, domain).await
            }
            "eth_signTransaction" => Ok(json!(self.sign_transaction(params, domain).await?)),
            "eth_sendTransaction" => {
                let raw = self.sign_transaction(params, domain).await?;
                let hash = self
                    .rpc
                    .request(chain_id, "eth_sendRawTransaction", json!([raw]))
                    .await?;
                info!(chain_id, "transaction sent");
                Ok(hash)
            }
            "eth_getBalance" => {
                let block = params.get(1).and_then(Value::as_str).unwrap_or("latest");
                let balance = self.rpc.get_balance(chain_id, str_param(params, 0), block).await;
                Ok(json!(balance))
            }
            _ if classify(method) == MethodClass::Public => Ok(self
                .rpc
                .request(chain_id, method, Value::Array(params.to_vec()))
                .await?),
            _ => Err(ProviderRpcError::unknown_method(method)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SignerError;
    use async_trait::async_trait;
    use keel_auth::{
        MemoryPermissionStore, MemorySettingsStore, NoopIndicator, SessionAuthority,
        SessionBroadcaster, SessionConfig, SessionSubject, TokenIssuer, WalletSettings,
    };
    use keel_core::{ManualClock, RequestId};
    use keel_rpc::RpcClientError;
    use keel_store::MemoryStore;
    use parking_lot::Mutex;
    use std::time::Duration;

    const ORIGIN: &str = "https://dapp.test";
    const ACCOUNT: &str = "0xAbC0000000000000000000000000000000000001";

    struct FakeSigner;

    #[async_trait]
    impl Signer for FakeSigner {
        async fn accounts(&self) -> Result<Vec<String>, SignerError> {
            Ok(vec![ACCOUNT.to_string()])
        }

        async fn sign_transaction(&self, _transaction: &Value, chain_id: u64) -> Result<String, SignerError> {
            Ok(format!("0xraw{chain_id}"))
        }

        async fn sign_message(&self, method: &str, _address: &str, _payload: &Value) -> Result<String, SignerError> {
            Ok(format!("0xsig:{method}"))
        }
    }

    #[derive(Default)]
    struct FakeRpc {
        calls: Mutex<Vec<(u64, String, Value)>>,
    }

    #[async_trait]
    impl ChainRpc for FakeRpc {
        async fn request(&self, chain_id: u64, method: &str, params: Value) -> Result<Value, RpcClientError> {
            self.calls.lock().push((chain_id, method.to_string(), params));
            match method {
                "eth_sendRawTransaction" => Ok(json!("0xhash")),
                "eth_call" => Err(RpcClientError::JsonRpc {
                    code: 3,
                    message: "execution reverted".into(),
                    data: None,
                }),
                _ => Ok(json!("0x2a")),
            }
        }

        async fn get_balance(&self, _chain_id: u64, _address: &str, _block: &str) -> String {
            "0x10".to_string()
        }
    }

    struct RecordingPrompt {
        decision: ApprovalDecision,
        unlocks: Option<Arc<MemorySettingsStore>>,
        seen: Mutex<Vec<ApprovalKind>>,
    }

    #[async_trait]
    impl ApprovalPrompt for RecordingPrompt {
        async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision {
            self.seen.lock().push(request.kind);
            if request.kind == ApprovalKind::Unlock && self.decision == ApprovalDecision::Approved {
                if let Some(settings) = &self.unlocks {
                    settings.set_locked(false);
                }
            }
            self.decision
        }
    }

    struct Quiet;

    #[async_trait]
    impl SessionBroadcaster for Quiet {
        async fn broadcast(&self, _kind: &str, _payload: Value) {}
    }

    struct Harness {
        dispatcher: RequestDispatcher,
        settings: Arc<MemorySettingsStore>,
        permissions: Arc<MemoryPermissionStore>,
        rpc: Arc<FakeRpc>,
        prompt: Arc<RecordingPrompt>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn seen(&self) -> Vec<ApprovalKind> {
            self.prompt.seen.lock().clone()
        }

        async fn grant(&self, expiry: Option<i64>) {
            self.permissions
                .grant(PermissionGrant {
                    domain: "dapp.test".into(),
                    accounts: vec![ACCOUNT.into()],
                    expiry,
                })
                .await;
        }

        async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
            let mut request = RequestMessage::new(RequestId(1), method, params);
            request.origin = Some(ORIGIN.to_string());
            self.dispatcher.handle(&request).await
        }
    }

    async fn harness_with(decision: ApprovalDecision, unlocks: bool) -> Harness {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let settings = Arc::new(MemorySettingsStore::new(Some(WalletSettings::ready()), true));
        let permissions = Arc::new(MemoryPermissionStore::new());
        let session = Arc::new(SessionAuthority::new(
            SessionConfig::default(),
            TokenIssuer::new(b"k", Duration::from_secs(3600)),
            clock.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(Quiet),
            Arc::new(NoopIndicator),
        ));
        let _ = session
            .start_session(SessionSubject {
                user_id: "u1".into(),
                username: "alice".into(),
                profile_id: "p1".into(),
                plan_level: "basic".into(),
            })
            .await
            .unwrap();
        let authorizer = Arc::new(RequestAuthorizer::new(
            settings.clone(),
            permissions.clone(),
            session,
            clock.clone(),
        ));
        let rpc = Arc::new(FakeRpc::default());
        let prompt = Arc::new(RecordingPrompt {
            decision,
            unlocks: unlocks.then(|| settings.clone()),
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = RequestDispatcher::new(
            DispatcherParts {
                authorizer,
                permissions: permissions.clone(),
                signer: Arc::new(FakeSigner),
                prompt: prompt.clone(),
                rpc: rpc.clone(),
                clock: clock.clone(),
            },
            1,
        );
        Harness {
            dispatcher,
            settings,
            permissions,
            rpc,
            prompt,
            clock,
        }
    }

    async fn harness() -> Harness {
        harness_with(ApprovalDecision::Approved, false).await
    }

    #[tokio::test]
    async fn chain_state_reads() {
        let h = harness().await;
        assert_eq!(h.call("eth_chainId", json!([])).await.unwrap(), json!("0x1"));
        assert_eq!(h.call("net_version", json!([])).await.unwrap(), json!("1"));
        assert!(h.seen().is_empty());
    }

    #[tokio::test]
    async fn accounts_empty_without_grant() {
        let h = harness().await;
        assert_eq!(h.call("eth_accounts", json!([])).await.unwrap(), json!([]));
        h.grant(None).await;
        assert_eq!(h.call("eth_accounts", json!([])).await.unwrap(), json!([ACCOUNT]));
    }

    #[tokio::test]
    async fn request_accounts_prompts_and_grants() {
        let h = harness().await;
        let mut events = h.dispatcher.subscribe();

        let accounts = h.call("eth_requestAccounts", json!([])).await.unwrap();
        assert_eq!(accounts, json!([ACCOUNT]));
        assert_eq!(h.seen(), vec![ApprovalKind::Connect]);
        assert!(h.permissions.get_permission("dapp.test").await.is_some());

        let event = events.try_recv().unwrap();
        assert_eq!(event.event, EventKind::AccountsChanged);
        assert_eq!(event.data, json!([ACCOUNT]));

        let again = h.call("eth_requestAccounts", json!([])).await.unwrap();
        assert_eq!(again, json!([ACCOUNT]));
        assert_eq!(h.seen().len(), 1);
    }

    #[tokio::test]
    async fn rejected_connect_is_user_rejected() {
        let h = harness_with(ApprovalDecision::Rejected, false).await;
        let err = h.call("eth_requestAccounts", json!([])).await.unwrap_err();
        assert_eq!(err.code, 4001);
        assert!(h.permissions.get_permission("dapp.test").await.is_none());
    }

    #[tokio::test]
    async fn locked_wallet_prompts_unlock_then_fails() {
        let h = harness_with(ApprovalDecision::Rejected, false).await;
        h.grant(None).await;
        h.settings.set_locked(true);

        let err = h
            .call("eth_sendTransaction", json!([{"from": ACCOUNT, "to": "0x2"}]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthRequired);
        assert_eq!(err.message, "Wallet is locked");
        assert_eq!(h.seen(), vec![ApprovalKind::Unlock]);
        assert!(h.rpc.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn unlock_then_consent_then_send() {
        let h = harness_with(ApprovalDecision::Approved, true).await;
        h.grant(None).await;
        h.settings.set_locked(true);

        let hash = h
            .call("eth_sendTransaction", json!([{"from": ACCOUNT, "to": "0x2"}]))
            .await
            .unwrap();
        assert_eq!(hash, json!("0xhash"));
        assert_eq!(h.seen(), vec![ApprovalKind::Unlock, ApprovalKind::Transaction]);
        let calls = h.rpc.calls.lock();
        assert_eq!(calls[0], (1, "eth_sendRawTransaction".to_string(), json!(["0xraw1"])));
    }

    #[tokio::test]
    async fn signing_requires_granted_address() {
        let h = harness().await;
        h.grant(None).await;
        let sig = h
            .call("personal_sign", json!(["0x68656c6c6f", ACCOUNT.to_lowercase()]))
            .await
            .unwrap();
        assert_eq!(sig, json!("0xsig:personal_sign"));

        let err = h.call("personal_sign", json!(["0x00", "0xdead"])).await.unwrap_err();
        assert_eq!(err.code, 4100);
    }

    #[tokio::test]
    async fn rejected_consent_blocks_signing() {
        let h = harness_with(ApprovalDecision::Rejected, false).await;
        h.grant(None).await;
        let err = h
            .call("eth_signTypedData_v4", json!([ACCOUNT, "{}"]))
            .await
            .unwrap_err();
        assert_eq!(err.code, 4001);
        assert_eq!(h.seen(), vec![ApprovalKind::Sign]);
    }

    #[tokio::test]
    async fn expired_grant_is_ignored() {
        let h = harness().await;
        h.grant(Some(h.clock.now_ms() - 1)).await;
        assert_eq!(h.call("eth_accounts", json!([])).await.unwrap(), json!([]));
        let err = h.call("personal_sign", json!(["0x00", ACCOUNT])).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn params_checked_before_authorization() {
        let h = harness().await;
        h.settings.set_locked(true);
        let err = h.call("eth_sendTransaction", json!([])).await.unwrap_err();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "Transaction parameters required");
        assert!(h.seen().is_empty());
    }

    #[tokio::test]
    async fn switch_chain_emits_and_validates() {
        let h = harness().await;
        h.grant(None).await;
        let mut events = h.dispatcher.subscribe();

        h.call("wallet_switchEthereumChain", json!([{"chainId": "0x89"}]))
            .await
            .unwrap();
        assert_eq!(h.dispatcher.chain_id(), 137);
        let event = events.try_recv().unwrap();
        assert_eq!(event.event, EventKind::ChainChanged);
        assert_eq!(event.data, json!("0x89"));

        let err = h
            .call("wallet_switchEthereumChain", json!([{"chainId": "0x999"}]))
            .await
            .unwrap_err();
        assert_eq!(err.code, -32602);

        h.call("wallet_addEthereumChain", json!([{"chainId": "0x999"}]))
            .await
            .unwrap();
        h.call("wallet_switchEthereumChain", json!([{"chainId": "0x999"}]))
            .await
            .unwrap();
        assert_eq!(h.dispatcher.chain_id(), 0x999);
    }

    #[tokio::test]
    async fn reads_go_to_the_pool() {
        let h = harness().await;
        assert_eq!(
            h.call("eth_getBalance", json!([ACCOUNT, "latest"])).await.unwrap(),
            json!("0x10")
        );
        assert_eq!(h.call("eth_blockNumber", json!([])).await.unwrap(), json!("0x2a"));
        let err = h.call("eth_call", json!([{}])).await.unwrap_err();
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "execution reverted");
    }

    #[tokio::test]
    async fn permissions_lifecycle() {
        let h = harness().await;
        assert_eq!(h.call("wallet_getPermissions", json!([])).await.unwrap_err().code, 4100);

        h.grant(None).await;
        let perms = h.call("wallet_getPermissions", json!([])).await.unwrap();
        assert_eq!(perms[0]["parentCapability"], "eth_accounts");
        assert_eq!(perms[0]["caveats"][0]["value"], json!([ACCOUNT]));

        h.call("wallet_revokePermissions", json!([{"eth_accounts": {}}]))
            .await
            .unwrap();
        assert!(h.permissions.get_permission("dapp.test").await.is_none());
    }

    #[tokio::test]
    async fn unknown_method_rejected() {
        let h = harness().await;
        let err = h.call("eth_coinbase_bonus", json!([])).await.unwrap_err();
        assert_eq!(err.code, 4200);
    }

    #[tokio::test]
    async fn respond_wraps_errors() {
        let h = harness().await;
        let request = RequestMessage::new(RequestId(9), "eth_nope", json!([]));
        let response = h.dispatcher.respond(&request).await;
        assert_eq!(response.id, RequestId(9));
        assert_eq!(response.error.unwrap().code, 4200);

        let request = RequestMessage::new(RequestId(10), "eth_chainId", json!([]));
        assert_eq!(h.dispatcher.respond(&request).await.result, Some(json!("0x1")));
    }
}
