//! Retry policy and the generic async retry combinator.
//!
//! - [`RetryPolicy`]: attempt ceiling plus two independent exponential
//!   backoff schedules, one for generic transport failures and one for
//!   rate-limit responses
//! - [`Retryable`]: how an error classifies itself for retry
//! - [`retry()`]: drives an async operation under a policy
//!
//! With the defaults, transport failures wait 500ms, 1000ms, ... and
//! rate-limit failures wait 1000ms, 2000ms, ..., never exceeding three
//! attempts in total.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default attempt ceiling (first call included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for transport failures in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default base delay for rate-limit responses in milliseconds.
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1000;
/// Default cap on a single delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Retry parameters consumed by [`retry()`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of attempts, first call included (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for transport/HTTP failures in ms (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Base delay for rate-limit responses in ms (default: 1000).
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    /// Cap on any single delay in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_rate_limit_delay_ms() -> u64 {
    DEFAULT_RATE_LIMIT_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            rate_limit_delay_ms: DEFAULT_RATE_LIMIT_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the `n`th (zero-based) failure of `class`.
    pub fn delay_for(&self, class: BackoffClass, n: u32) -> Duration {
        let base = match class {
            BackoffClass::Transport => self.base_delay_ms,
            BackoffClass::RateLimited => self.rate_limit_delay_ms,
        };
        Duration::from_millis(calculate_backoff_delay(n, base, self.max_delay_ms))
    }
}

/// Exponential backoff: `min(max_delay, base_delay * 2^attempt)`.
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Which backoff schedule a retryable failure follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffClass {
    /// Generic transport or HTTP failure.
    Transport,
    /// Upstream rate limiting.
    RateLimited,
}

/// Outcome of classifying a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given schedule's delay.
    Retry(BackoffClass),
    /// Surface immediately.
    Stop,
}

/// Errors that know whether they are worth retrying.
pub trait Retryable {
    /// Classify this failure.
    fn retry_decision(&self) -> RetryDecision;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combinator
// ─────────────────────────────────────────────────────────────────────────────

/// Run `op` under `policy`.
///
/// `op` receives the 1-based attempt number. Each backoff class keeps its own
/// exponent, so a rate-limit failure after a transport failure still waits
/// the rate-limit base delay. The last error is returned once the attempt
/// ceiling is reached or the error asks to stop.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut transport_failures = 0u32;
    let mut rate_limit_failures = 0u32;
    let mut attempt = 1u32;

    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let class = match err.retry_decision() {
            RetryDecision::Retry(class) => class,
            RetryDecision::Stop => return Err(err),
        };
        if attempt >= max_attempts {
            warn!(attempt, error = %err, "retries exhausted");
            return Err(err);
        }

        let counter = match class {
            BackoffClass::Transport => &mut transport_failures,
            BackoffClass::RateLimited => &mut rate_limit_failures,
        };
        let delay = policy.delay_for(class, *counter);
        *counter += 1;

        debug!(
            attempt,
            ?class,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retrying after failure"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
