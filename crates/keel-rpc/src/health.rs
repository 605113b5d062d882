//! Vendor health tracking.
//!
//! A vendor whose calls exhaust their retries `threshold` times in a row is
//! suspended for `suspend_for` and skipped by the pool. Any success resets
//! its failure count.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::endpoint::Vendor;

#[derive(Debug, Default)]
struct VendorState {
    consecutive_failures: u32,
    suspended_until: Option<Instant>,
}

/// Consecutive-failure tracker with timed suspension.
#[derive(Debug)]
pub struct VendorHealth {
    threshold: u32,
    suspend_for: Duration,
    states: Mutex<HashMap<Vendor, VendorState>>,
}

impl VendorHealth {
    /// Create a tracker.
    pub fn new(threshold: u32, suspend_for: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            suspend_for,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `vendor` may be used now. An elapsed suspension is lifted.
    pub fn is_available(&self, vendor: Vendor) -> bool {
        let mut states = self.states.lock();
        let Some(state) = states.get_mut(&vendor) else {
            return true;
        };
        match state.suspended_until {
            Some(until) if Instant::now() < until => false,
            Some(_) => {
                info!(%vendor, "vendor suspension lifted");
                state.suspended_until = None;
                state.consecutive_failures = 0;
                true
            }
            None => true,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, vendor: Vendor) {
        if let Some(state) = self.states.lock().get_mut(&vendor) {
            state.consecutive_failures = 0;
        }
    }

    /// Record an exhausted call. Returns `true` if this suspended the vendor.
    pub fn record_failure(&self, vendor: Vendor) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(vendor).or_default();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold && state.suspended_until.is_none() {
            state.suspended_until = Some(Instant::now() + self.suspend_for);
            warn!(
                %vendor,
                failures = state.consecutive_failures,
                suspend_ms = u64::try_from(self.suspend_for.as_millis()).unwrap_or(u64::MAX),
                "vendor suspended"
            );
            return true;
        }
        false
    }

    /// Consecutive failures recorded for `vendor`.
    pub fn failures(&self, vendor: Vendor) -> u32 {
        self.states
            .lock()
            .get(&vendor)
            .map_or(0, |s| s.consecutive_failures)
    }
}
