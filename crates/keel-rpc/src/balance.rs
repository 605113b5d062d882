//! Single-flight queue for balance reads.
//!
//! Balance lookups are the most frequent vendor call a wallet UI makes.
//! They are dispatched one at a time, at least `spacing` apart, in arrival
//! order (the underlying mutex is fair).

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Balance returned when every attempt to read one failed.
pub const ZERO_BALANCE: &str = "0x0";

/// Serializes balance dispatches with a minimum spacing.
#[derive(Debug)]
pub struct BalanceQueue {
    spacing: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl BalanceQueue {
    /// Create a queue enforcing `spacing` between dispatches.
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Run `call` once every earlier call has finished and `spacing` has
    /// elapsed since the previous dispatch.
    pub async fn run<F, Fut, T>(&self, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.spacing).await;
        }
        *last = Some(Instant::now());
        call().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn dispatches_are_spaced() {
        let queue = Arc::new(BalanceQueue::new(Duration::from_millis(100)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for i in 0..3u64 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                q.run(|| async move { (i, Instant::now()) }).await
            }));
            tokio::task::yield_now().await;
        }

        let mut stamps = Vec::new();
        for h in handles {
            stamps.push(h.await.unwrap());
        }
        stamps.sort_by_key(|(_, t)| *t);
        let offsets: Vec<u128> = stamps.iter().map(|(_, t)| (*t - start).as_millis()).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(stamps.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_calls_hold_the_queue() {
        let queue = Arc::new(BalanceQueue::new(Duration::from_millis(100)));
        let start = Instant::now();

        let q = queue.clone();
        let first = tokio::spawn(async move {
            q.run(|| tokio::time::sleep(Duration::from_millis(300))).await;
        });
        tokio::task::yield_now().await;
        let second = queue.run(|| async { Instant::now() }).await;
        first.await.unwrap();

        assert_eq!((second - start).as_millis(), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_queue_dispatches_immediately() {
        let queue = BalanceQueue::new(Duration::from_millis(100));
        let _ = queue.run(|| async {}).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        let before = Instant::now();
        let at = queue.run(|| async { Instant::now() }).await;
        assert_eq!(at, before);
    }
}
