//! Client-side pacing for outbound model calls.

use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between two calls to the generative model.
pub const MIN_CALL_INTERVAL: Duration = Duration::from_millis(2000);

/// Serializes callers so that permitted calls are at least `min_interval` apart.
///
/// The lock is held across the wait, so concurrent callers queue behind each
/// other instead of all sleeping against the same stale timestamp.
#[derive(Debug)]
pub struct RateGate {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateGate {
    /// Create an independent gate.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// The process-wide gate shared by every extraction client that does not
    /// bring its own.
    pub fn shared() -> Arc<RateGate> {
        static SHARED: OnceLock<Arc<RateGate>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(RateGate::new(MIN_CALL_INTERVAL)))
            .clone()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call is allowed, then claim the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!("Rate gate: waiting {:?} before next model call", wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(MIN_CALL_INTERVAL)
    }
}
