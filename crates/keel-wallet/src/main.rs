//! # keel
//!
//! Command-line entry point. `request` runs a provider call through the full
//! page → relay → background path in one process; `endpoints` and `queue`
//! inspect configuration and persisted state.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use keel_auth::{MemoryPermissionStore, MemorySettingsStore, NoopIndicator, WalletSettings};
use keel_background::{QUEUE_KEY, StaticApproval, UnavailableSigner};
use keel_core::SystemClock;
use keel_relay::TabInfo;
use keel_rpc::{EndpointResolver, RpcProviderPool, Vendor};
use keel_settings::KeelSettings;
use keel_store::{KeyValueStore, SqliteStore};
use keel_wallet::{RuntimeParts, STORE_FILE, WalletRuntime};
use serde_json::{Value, json};

/// Keel wallet relay.
#[derive(Parser, Debug)]
#[command(name = "keel", about = "Keel wallet relay")]
struct Cli {
    /// Settings file (default `$KEEL_HOME/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one provider request and print its result.
    Request {
        /// JSON-RPC method.
        method: String,
        /// Params as a JSON array.
        params: Option<String>,
        /// Origin the request is made from.
        #[arg(long, default_value = "https://cli.keel.local")]
        origin: String,
        /// Approve every prompt instead of rejecting.
        #[arg(long)]
        approve: bool,
    },
    /// Show the endpoint a vendor serves a chain from (key redacted).
    Endpoints {
        /// Vendor id (`alchemy`, `infura`, `quicknode`).
        vendor: String,
        /// Chain id.
        chain_id: u64,
    },
    /// Print the persisted background message queue.
    Queue,
}

fn open_store(settings: &KeelSettings) -> Result<SqliteStore> {
    let dir = keel_settings::resolve_data_dir(settings);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    let path = dir.join(STORE_FILE);
    SqliteStore::open(&path).with_context(|| format!("Failed to open store: {}", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_request(
    settings: KeelSettings,
    method: &str,
    params: Option<&str>,
    origin: &str,
    approve: bool,
) -> Result<()> {
    let params: Value = match params {
        Some(raw) => serde_json::from_str(raw).context("params must be JSON")?,
        None => json!([]),
    };
    let store: Arc<dyn KeyValueStore> = Arc::new(open_store(&settings)?);
    let pool = RpcProviderPool::from_settings(&settings.rpc)
        .context("Failed to build RPC pool")?
        .into_shared();
    let prompt = if approve {
        StaticApproval::approve_all()
    } else {
        StaticApproval::reject_all()
    };

    let runtime = WalletRuntime::start(
        settings,
        RuntimeParts {
            store,
            rpc: pool,
            wallet_settings: Arc::new(MemorySettingsStore::new(Some(WalletSettings::ready()), true)),
            permissions: Arc::new(MemoryPermissionStore::new()),
            signer: Arc::new(UnavailableSigner),
            prompt: Arc::new(prompt),
            indicator: Arc::new(NoopIndicator),
            clock: Arc::new(SystemClock),
        },
    )
    .await;

    let page = runtime
        .open_page(
            origin,
            TabInfo {
                title: "keel cli".to_string(),
                icon: None,
            },
        )
        .await;
    let outcome = page.facade.request(method, params).await;
    page.close();
    runtime.shutdown().await;

    match outcome {
        Ok(result) => print_json(&result),
        Err(e) => {
            print_json(&json!({ "code": e.code, "message": e.message, "data": e.data }))?;
            Err(anyhow::Error::new(e).context(format!("{method} failed")))
        }
    }
}

fn run_endpoints(settings: &KeelSettings, vendor: &str, chain_id: u64) -> Result<()> {
    let parsed = Vendor::parse(vendor).ok_or_else(|| anyhow!("unknown vendor: {vendor}"))?;
    let resolver = EndpointResolver::from_settings(&settings.rpc);
    let endpoint = resolver
        .resolve(parsed, chain_id)
        .ok_or_else(|| anyhow!("{vendor} has no endpoint for chain {chain_id} (missing route or API key)"))?;
    print_json(&json!({
        "vendor": endpoint.vendor.as_str(),
        "chainId": endpoint.chain_id,
        "network": endpoint.network,
        "url": endpoint.redacted_url(),
    }))
}

async fn run_queue(settings: &KeelSettings) -> Result<()> {
    let store = open_store(settings)?;
    let queue = store
        .get(QUEUE_KEY)
        .await
        .context("Failed to read queue")?
        .unwrap_or_else(|| json!([]));
    print_json(&queue)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.unwrap_or_else(keel_settings::settings_path);
    let settings = keel_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings: {}", path.display()))?;
    keel_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    match cli.command {
        Command::Request {
            method,
            params,
            origin,
            approve,
        } => run_request(settings, &method, params.as_deref(), &origin, approve).await,
        Command::Endpoints { vendor, chain_id } => run_endpoints(&settings, &vendor, chain_id),
        Command::Queue => run_queue(&settings).await,
    }
}
