//! # keel-rpc
//!
//! Multi-vendor JSON-RPC access for the Keel wallet.
//!
//! - [`EndpointResolver`]: `(vendor, chain)` → endpoint, cached, fails closed
//! - [`JsonRpcClient`]: JSON-RPC 2.0 over HTTP with per-call timeout and retry
//! - [`BalanceQueue`]: single-flight, spaced dispatch for balance reads
//! - [`VendorHealth`]: suspends vendors after repeated exhausted calls
//! - [`RpcProviderPool`]: ordered vendor failover behind the [`ChainRpc`] trait

#![deny(unsafe_code)]

pub mod balance;
pub mod client;
pub mod endpoint;
pub mod errors;
pub mod health;
pub mod pool;

pub use balance::{BalanceQueue, ZERO_BALANCE};
pub use client::{JsonRpcClient, RequestOptions};
pub use endpoint::{EndpointConfig, EndpointResolver, MAINNET, Vendor, supported_chains};
pub use errors::RpcClientError;
pub use health::VendorHealth;
pub use pool::{ChainRpc, RpcProviderPool};
