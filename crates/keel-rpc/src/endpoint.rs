//! Vendor endpoint resolution.
//!
//! A `(vendor, chain)` pair maps to a JSON-RPC URL through a static routing
//! table. Chains a vendor does not list fall back to that vendor's mainnet
//! route. Resolution fails closed: without an API key for the vendor no
//! config is produced, so no URL with a missing key is ever built.
//! Resolved configs are cached for the life of the resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use keel_settings::RpcSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Blockchain-data vendors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Alchemy.
    Alchemy,
    /// Infura.
    Infura,
    /// `QuickNode`.
    #[serde(rename = "quicknode")]
    QuickNode,
}

impl Vendor {
    /// Parse a vendor id (case-insensitive).
    pub fn parse(id: &str) -> Option<Self> {
        match id.to_ascii_lowercase().as_str() {
            "alchemy" => Some(Self::Alchemy),
            "infura" => Some(Self::Infura),
            "quicknode" => Some(Self::QuickNode),
            _ => None,
        }
    }

    /// Vendor id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alchemy => "alchemy",
            Self::Infura => "infura",
            Self::QuickNode => "quicknode",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved endpoint for one `(vendor, chain)` pair.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Vendor.
    pub vendor: Vendor,
    /// Chain the endpoint serves.
    pub chain_id: u64,
    /// Full JSON-RPC URL, key included.
    #[serde(skip)]
    pub base_url: String,
    /// Vendor credential.
    #[serde(skip)]
    pub api_key: String,
    /// Network name (`mainnet`, `sepolia`, ...).
    pub network: String,
}

impl EndpointConfig {
    /// URL with the API key replaced by `***`.
    pub fn redacted_url(&self) -> String {
        if self.api_key.is_empty() {
            self.base_url.clone()
        } else {
            self.base_url.replace(&self.api_key, "***")
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("vendor", &self.vendor)
            .field("chain_id", &self.chain_id)
            .field("base_url", &self.redacted_url())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing table
// ─────────────────────────────────────────────────────────────────────────────

struct Route {
    vendor: Vendor,
    chain_id: u64,
    host: &'static str,
    network: &'static str,
}

const fn route(vendor: Vendor, chain_id: u64, host: &'static str, network: &'static str) -> Route {
    Route {
        vendor,
        chain_id,
        host,
        network,
    }
}

/// Chain id of Ethereum mainnet, the fallback route for every vendor.
pub const MAINNET: u64 = 1;

const ROUTES: &[Route] = &[
    route(Vendor::Alchemy, 1, "eth-mainnet.g.alchemy.com", "mainnet"),
    route(Vendor::Alchemy, 11_155_111, "eth-sepolia.g.alchemy.com", "sepolia"),
    route(Vendor::Alchemy, 137, "polygon-mainnet.g.alchemy.com", "polygon"),
    route(Vendor::Alchemy, 80_001, "polygon-mumbai.g.alchemy.com", "polygon-mumbai"),
    route(Vendor::Alchemy, 42_161, "arb-mainnet.g.alchemy.com", "arbitrum"),
    route(Vendor::Alchemy, 10, "opt-mainnet.g.alchemy.com", "optimism"),
    route(Vendor::Infura, 1, "mainnet.infura.io", "mainnet"),
    route(Vendor::Infura, 11_155_111, "sepolia.infura.io", "sepolia"),
    route(Vendor::Infura, 137, "polygon-mainnet.infura.io", "polygon"),
    route(Vendor::Infura, 80_001, "polygon-mumbai.infura.io", "polygon-mumbai"),
    route(Vendor::Infura, 42_161, "arbitrum-mainnet.infura.io", "arbitrum"),
    route(Vendor::Infura, 10, "optimism-mainnet.infura.io", "optimism"),
    route(Vendor::QuickNode, 1, "eth-mainnet.quicknode.pro", "mainnet"),
    route(Vendor::QuickNode, 11_155_111, "sepolia.quicknode.pro", "sepolia"),
    route(Vendor::QuickNode, 137, "polygon-mainnet.quicknode.pro", "polygon"),
];

/// Chain ids with at least one explicit vendor route, ascending.
pub fn supported_chains() -> Vec<u64> {
    let mut chains: Vec<u64> = ROUTES.iter().map(|r| r.chain_id).collect();
    chains.sort_unstable();
    chains.dedup();
    chains
}

fn lookup_route(vendor: Vendor, chain_id: u64) -> Option<&'static Route> {
    let find = |chain| ROUTES.iter().find(|r| r.vendor == vendor && r.chain_id == chain);
    find(chain_id).or_else(|| find(MAINNET))
}

fn build_url(vendor: Vendor, host: &str, api_key: &str) -> String {
    match vendor {
        Vendor::Alchemy => format!("https://{host}/v2/{api_key}"),
        Vendor::Infura => format!("https://{host}/v3/{api_key}"),
        Vendor::QuickNode => format!("https://{host}/{api_key}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves and caches [`EndpointConfig`]s.
#[derive(Debug, Default)]
pub struct EndpointResolver {
    api_keys: HashMap<Vendor, String>,
    overrides: HashMap<(Vendor, u64), String>,
    cache: DashMap<(Vendor, u64), Arc<EndpointConfig>>,
}

impl EndpointResolver {
    /// Create a resolver from vendor credentials.
    pub fn new(api_keys: HashMap<Vendor, String>) -> Self {
        Self {
            api_keys,
            overrides: HashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Build from settings, ignoring unknown vendor ids.
    pub fn from_settings(settings: &RpcSettings) -> Self {
        let mut api_keys = HashMap::new();
        for (id, key) in &settings.api_keys {
            match Vendor::parse(id) {
                Some(vendor) if !key.is_empty() => {
                    let _ = api_keys.insert(vendor, key.clone());
                }
                Some(_) => {}
                None => warn!(vendor = %id, "ignoring API key for unknown vendor"),
            }
        }
        let mut resolver = Self::new(api_keys);
        for o in &settings.endpoint_overrides {
            match Vendor::parse(&o.vendor) {
                Some(vendor) => resolver = resolver.with_override(vendor, o.chain_id, o.url.clone()),
                None => warn!(vendor = %o.vendor, "ignoring endpoint override for unknown vendor"),
            }
        }
        resolver
    }

    /// Pin `(vendor, chain)` to a fixed URL. Overrides need no API key.
    #[must_use]
    pub fn with_override(mut self, vendor: Vendor, chain_id: u64, url: impl Into<String>) -> Self {
        let _ = self.overrides.insert((vendor, chain_id), url.into());
        self
    }

    /// Resolve the endpoint for `(vendor, chain)`, or `None` when no credential exists.
    pub fn resolve(&self, vendor: Vendor, chain_id: u64) -> Option<Arc<EndpointConfig>> {
        if let Some(hit) = self.cache.get(&(vendor, chain_id)) {
            return Some(Arc::clone(hit.value()));
        }

        let config = if let Some(url) = self.overrides.get(&(vendor, chain_id)) {
            EndpointConfig {
                vendor,
                chain_id,
                base_url: url.clone(),
                api_key: String::new(),
                network: "custom".to_string(),
            }
        } else {
            let Some(api_key) = self.api_keys.get(&vendor) else {
                warn!(%vendor, chain_id, "no API key for vendor, endpoint unavailable");
                return None;
            };
            let route = lookup_route(vendor, chain_id)?;
            if route.chain_id != chain_id {
                debug!(%vendor, chain_id, "chain not routed, falling back to mainnet");
            }
            EndpointConfig {
                vendor,
                chain_id,
                base_url: build_url(vendor, route.host, api_key),
                api_key: api_key.clone(),
                network: route.network.to_string(),
            }
        };

        let config = Arc::new(config);
        let _ = self.cache.insert((vendor, chain_id), Arc::clone(&config));
        Some(config)
    }

    /// Whether a credential or override exists for `vendor`.
    pub fn has_credentials(&self, vendor: Vendor) -> bool {
        self.api_keys.contains_key(&vendor) || self.overrides.keys().any(|(v, _)| *v == vendor)
    }

    /// Number of cached configs.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
