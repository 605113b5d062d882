//! Vendor pool with ordered failover.
//!
//! [`RpcProviderPool`] tries vendors in configured order, skipping vendors
//! without credentials and vendors that [`VendorHealth`] has suspended.
//! A JSON-RPC `error` answer is final: the vendor answered, so no other
//! vendor is tried. Balance reads go through the [`BalanceQueue`] and never
//! fail; every other call class propagates the typed failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keel_settings::RpcSettings;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::balance::{BalanceQueue, ZERO_BALANCE};
use crate::client::{JsonRpcClient, RequestOptions};
use crate::endpoint::{EndpointResolver, Vendor};
use crate::errors::RpcClientError;
use crate::health::VendorHealth;

/// Chain access consumed by the background.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Forward an arbitrary JSON-RPC call.
    async fn request(&self, chain_id: u64, method: &str, params: Value) -> Result<Value, RpcClientError>;

    /// Balance of `address` at `block` as a hex quantity. Never fails:
    /// irrecoverable failures read as [`ZERO_BALANCE`].
    async fn get_balance(&self, chain_id: u64, address: &str, block: &str) -> String;
}

/// Multi-vendor JSON-RPC pool.
#[derive(Debug)]
pub struct RpcProviderPool {
    resolver: EndpointResolver,
    client: JsonRpcClient,
    vendors: Vec<Vendor>,
    health: VendorHealth,
    balances: BalanceQueue,
}

impl RpcProviderPool {
    /// Assemble a pool from parts.
    pub fn new(
        resolver: EndpointResolver,
        client: JsonRpcClient,
        vendors: Vec<Vendor>,
        health: VendorHealth,
        balance_spacing: Duration,
    ) -> Self {
        Self {
            resolver,
            client,
            vendors,
            health,
            balances: BalanceQueue::new(balance_spacing),
        }
    }

    /// Build a pool from settings.
    pub fn from_settings(settings: &RpcSettings) -> Result<Self, RpcClientError> {
        let vendors = settings
            .vendor_order
            .iter()
            .filter_map(|id| {
                let vendor = Vendor::parse(id);
                if vendor.is_none() {
                    warn!(vendor = %id, "ignoring unknown vendor in vendorOrder");
                }
                vendor
            })
            .collect();
        Ok(Self::new(
            EndpointResolver::from_settings(settings),
            JsonRpcClient::from_settings(settings)?,
            vendors,
            VendorHealth::new(settings.failure_threshold, Duration::from_millis(settings.suspend_ms)),
            Duration::from_millis(settings.balance_spacing_ms),
        ))
    }

    /// Shared handle.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Endpoint resolver.
    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Vendor health tracker.
    pub fn health(&self) -> &VendorHealth {
        &self.health
    }

    /// Call `method` on the first vendor able to answer.
    pub async fn call(&self, chain_id: u64, method: &str, params: Value) -> Result<Value, RpcClientError> {
        let mut last_err = None;
        for &vendor in &self.vendors {
            if !self.health.is_available(vendor) {
                debug!(%vendor, "vendor suspended, skipping");
                continue;
            }
            let Some(endpoint) = self.resolver.resolve(vendor, chain_id) else {
                continue;
            };
            match self
                .client
                .request(&endpoint, method, params.clone(), &RequestOptions::default())
                .await
            {
                Ok(value) => {
                    self.health.record_success(vendor);
                    return Ok(value);
                }
                Err(err) if !err.is_vendor_fault() => {
                    self.health.record_success(vendor);
                    return Err(err);
                }
                Err(err) => {
                    warn!(%vendor, method, error = %err, "vendor call failed, trying next");
                    let _ = self.health.record_failure(vendor);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(RpcClientError::NoVendorAvailable(chain_id)))
    }

    /// Estimate gas for a transaction object.
    pub async fn estimate_gas(&self, chain_id: u64, tx: Value) -> Result<Value, RpcClientError> {
        self.call(chain_id, "eth_estimateGas", json!([tx])).await
    }

    /// Broadcast a signed transaction, returning its hash.
    pub async fn send_raw_transaction(&self, chain_id: u64, raw: &str) -> Result<Value, RpcClientError> {
        self.call(chain_id, "eth_sendRawTransaction", json!([raw])).await
    }

    /// Fetch a transaction receipt (`null` while pending).
    pub async fn get_transaction_receipt(&self, chain_id: u64, hash: &str) -> Result<Value, RpcClientError> {
        self.call(chain_id, "eth_getTransactionReceipt", json!([hash])).await
    }

    /// Query logs with a filter object.
    pub async fn get_logs(&self, chain_id: u64, filter: Value) -> Result<Value, RpcClientError> {
        self.call(chain_id, "eth_getLogs", json!([filter])).await
    }
}

#[async_trait]
impl ChainRpc for RpcProviderPool {
    async fn request(&self, chain_id: u64, method: &str, params: Value) -> Result<Value, RpcClientError> {
        self.call(chain_id, method, params).await
    }

    async fn get_balance(&self, chain_id: u64, address: &str, block: &str) -> String {
        let result = self
            .balances
            .run(|| self.call(chain_id, "eth_getBalance", json!([address, block])))
            .await;
        match result {
            Ok(Value::String(balance)) => balance,
            Ok(other) => {
                warn!(address, result = %other, "unexpected balance shape, using zero");
                ZERO_BALANCE.to_string()
            }
            Err(err) => {
                warn!(address, chain_id, error = %err, "balance unavailable, using zero");
                ZERO_BALANCE.to_string()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
