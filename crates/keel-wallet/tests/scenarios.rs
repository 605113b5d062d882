//! End-to-end scenarios through page, relay, hub, and background.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use keel_auth::{
    MemoryPermissionStore, MemorySettingsStore, NoopIndicator, SessionSubject, WalletSettings,
};
use keel_background::{SignerError, Signer, StaticApproval};
use keel_core::{ChannelName, Connector, Envelope, ErrorKind, EventKind, EventMessage, ManualClock};
use keel_relay::TabInfo;
use keel_rpc::{ChainRpc, RpcClientError, ZERO_BALANCE};
use keel_settings::KeelSettings;
use keel_store::{KeyValueStore, MemoryStore, SqliteStore};
use keel_wallet::{PageContext, RuntimeParts, WalletRuntime};
use serde_json::{Value, json};
use tokio::sync::broadcast;

const ORIGIN: &str = "https://dapp.test";

struct FixedSigner;

#[async_trait]
impl Signer for FixedSigner {
    async fn accounts(&self) -> Result<Vec<String>, SignerError> {
        Ok(vec!["0xabc".to_string()])
    }

    async fn sign_transaction(&self, _transaction: &Value, _chain_id: u64) -> Result<String, SignerError> {
        Ok("0xsigned".to_string())
    }

    async fn sign_message(&self, _method: &str, _address: &str, _payload: &Value) -> Result<String, SignerError> {
        Ok("0xsignature".to_string())
    }
}

struct EchoRpc;

#[async_trait]
impl ChainRpc for EchoRpc {
    async fn request(&self, _chain_id: u64, method: &str, _params: Value) -> Result<Value, RpcClientError> {
        match method {
            "eth_sendRawTransaction" => Ok(json!("0xhash")),
            "eth_blockNumber" => Ok(json!("0x10")),
            _ => Ok(Value::Null),
        }
    }

    async fn get_balance(&self, _chain_id: u64, _address: &str, _block: &str) -> String {
        ZERO_BALANCE.to_string()
    }
}

struct Harness {
    runtime: WalletRuntime,
    wallet: Arc<MemorySettingsStore>,
}

async fn harness_with(
    settings: KeelSettings,
    store: Arc<dyn KeyValueStore>,
    prompt: StaticApproval,
) -> Harness {
    let wallet = Arc::new(MemorySettingsStore::new(Some(WalletSettings::ready()), true));
    let runtime = WalletRuntime::start(
        settings,
        RuntimeParts {
            store,
            rpc: Arc::new(EchoRpc),
            wallet_settings: wallet.clone(),
            permissions: Arc::new(MemoryPermissionStore::new()),
            signer: Arc::new(FixedSigner),
            prompt: Arc::new(prompt),
            indicator: Arc::new(NoopIndicator),
            clock: Arc::new(ManualClock::new(1_700_000_000_000)),
        },
    )
    .await;
    Harness { runtime, wallet }
}

async fn harness(prompt: StaticApproval) -> Harness {
    harness_with(KeelSettings::default(), Arc::new(MemoryStore::new()), prompt).await
}

async fn open(h: &Harness) -> PageContext {
    h.runtime
        .open_page(
            ORIGIN,
            TabInfo {
                title: "Dapp".into(),
                icon: None,
            },
        )
        .await
}

fn subject() -> SessionSubject {
    SessionSubject {
        user_id: "u1".into(),
        username: "alice".into(),
        profile_id: "p1".into(),
        plan_level: "basic".into(),
    }
}

async fn next_event(rx: &mut broadcast::Receiver<EventMessage>, kind: EventKind) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.event == kind {
                return event.data;
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn chain_id_round_trip_then_cache() {
    let h = harness(StaticApproval::reject_all()).await;
    let page = open(&h).await;

    assert_eq!(page.facade.request("eth_chainId", json!([])).await.unwrap(), json!("0x1"));
    assert_eq!(page.facade.chain_id().as_deref(), Some("0x1"));
    assert_eq!(page.facade.request("eth_chainId", json!([])).await.unwrap(), json!("0x1"));
    assert_eq!(page.facade.pending_count(), 0);
    assert!(page.relay.has_discovery().await);
    assert!(!page.relay.has_legacy().await);
}

#[tokio::test]
async fn legacy_mode_uses_the_lazy_channel() {
    let mut settings = KeelSettings::default();
    settings.provider.use_discovery = false;
    let h = harness_with(settings, Arc::new(MemoryStore::new()), StaticApproval::reject_all()).await;
    let page = open(&h).await;

    assert!(!page.relay.has_discovery().await);
    assert_eq!(page.facade.request("net_version", json!([])).await.unwrap(), json!("1"));
    assert!(page.relay.has_legacy().await);
}

#[tokio::test]
async fn locked_wallet_refuses_protected_calls() {
    let h = harness(StaticApproval::reject_all()).await;
    h.wallet.set_locked(true);
    let page = open(&h).await;

    let err = page
        .facade
        .request("eth_sendTransaction", json!([{"from": "0xabc", "to": "0xdef"}]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AuthRequired);
    assert_eq!(err.code, 4102);

    // Public reads still work while locked.
    assert_eq!(page.facade.request("eth_blockNumber", json!([])).await.unwrap(), json!("0x10"));
}

#[tokio::test]
async fn connect_grants_accounts_and_connects_provider() {
    let h = harness(StaticApproval::approve_all()).await;
    let _ = h.runtime.session().start_session(subject()).await.unwrap();
    let page = open(&h).await;
    let mut events = page.facade.subscribe();

    let accounts = page.facade.request("eth_requestAccounts", json!([])).await.unwrap();
    assert_eq!(accounts, json!(["0xabc"]));
    assert_eq!(next_event(&mut events, EventKind::Connect).await["chainId"], json!(null));
    assert!(page.facade.is_connected());

    let hash = page
        .facade
        .request("eth_sendTransaction", json!([{"from": "0xabc", "to": "0xdef"}]))
        .await
        .unwrap();
    assert_eq!(hash, json!("0xhash"));
}

#[tokio::test]
async fn rejected_connect_is_user_rejected() {
    let h = harness(StaticApproval::reject_all()).await;
    let _ = h.runtime.session().start_session(subject()).await.unwrap();
    let page = open(&h).await;

    let err = page.facade.request("eth_requestAccounts", json!([])).await.unwrap_err();
    assert_eq!(err.code, 4001);
    assert!(!page.facade.is_connected());
}

#[tokio::test]
async fn chain_switch_reaches_every_page() {
    let h = harness(StaticApproval::approve_all()).await;
    let _ = h.runtime.session().start_session(subject()).await.unwrap();
    let page = open(&h).await;
    let other = open(&h).await;
    let mut other_events = other.facade.subscribe();

    let _ = page.facade.request("eth_requestAccounts", json!([])).await.unwrap();
    let result = page
        .facade
        .request("wallet_switchEthereumChain", json!([{"chainId": "0x89"}]))
        .await
        .unwrap();
    assert_eq!(result, Value::Null);

    assert_eq!(next_event(&mut other_events, EventKind::ChainChanged).await, json!("0x89"));
    assert_eq!(next_event(&mut other_events, EventKind::NetworkChanged).await, json!("137"));
    assert_eq!(other.facade.chain_id().as_deref(), Some("0x89"));
    assert_eq!(h.runtime.dispatcher().chain_id(), 137);
}

#[tokio::test]
async fn session_broadcasts_wait_for_a_ui_connection() {
    let h = harness(StaticApproval::reject_all()).await;
    let _ = h.runtime.session().start_session(subject()).await.unwrap();

    let queued = h.runtime.manager().queued();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind, "SESSION_LOGIN");

    let mut ui = h.runtime.hub().connect(ChannelName::Ui.as_str()).await.unwrap();
    let replayed = tokio::time::timeout(Duration::from_secs(2), ui.rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_matches!(replayed, Envelope::Event(e) if e.event == EventKind::Message && e.data["type"] == "SESSION_LOGIN");
    assert_eq!(h.runtime.manager().queue_len(), 0);
}

#[tokio::test]
async fn restart_restores_queue_and_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keel.db");
    let mut settings = KeelSettings::default();
    settings.session.signing_secret = Some("integration-secret".to_string());

    {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let h = harness_with(settings.clone(), store, StaticApproval::reject_all()).await;
        let _ = h.runtime.session().start_session(subject()).await.unwrap();
        assert_eq!(h.runtime.manager().queue_len(), 1);
        h.runtime.shutdown().await;
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let h = harness_with(settings, store, StaticApproval::reject_all()).await;
    assert!(h.runtime.session().is_live());
    assert_eq!(h.runtime.manager().queue_len(), 1);
    let token = h.runtime.session().token().unwrap();
    assert!(h.runtime.session().verify_token(&token).is_ok());
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn announcer_carries_configured_identity() {
    let h = harness(StaticApproval::reject_all()).await;
    let page = open(&h).await;
    let announcement = page.announcer.announce().unwrap();
    assert_eq!(announcement["detail"]["info"]["rdns"], "dev.keel.wallet");
}
