//! Throttled execution.
//!
//! A throttled operation occupies its lane for at least the minimum interval
//! computed when it was admitted. The operation and a timer run side by side
//! and the slot is released only once both have finished, so the visible
//! duration is `max(operation, interval)`.

use clerk_core::{minimum_interval, Bandwidth, LoadSignal};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Rate gate shared by every operation of one clerk.
#[derive(Clone)]
pub struct Throttle {
    bandwidth: Bandwidth,
    load: Arc<dyn LoadSignal>,
}

impl Throttle {
    /// Create a throttle spending `bandwidth` of the budget at the given load.
    pub fn new(bandwidth: Bandwidth, load: Arc<dyn LoadSignal>) -> Self {
        Self { bandwidth, load }
    }

    /// Bandwidth fraction this throttle spends.
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Minimum slot length at the current load.
    pub fn minimum_interval(&self) -> Duration {
        minimum_interval(self.bandwidth, self.load.current_load())
    }

    /// Run `operation`, holding the slot for at least the minimum interval.
    ///
    /// The interval is sampled once, when this is called. Failures of the
    /// operation are returned after the timer too.
    pub async fn run<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let interval = self.minimum_interval();
        tracing::debug!(interval_ms = interval.as_millis() as u64, "slot opened");

        let delay = tokio::time::sleep(interval);
        let (output, ()) = tokio::join!(operation(), delay);
        output
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("bandwidth", &self.bandwidth)
            .field("load", &self.load.current_load())
            .finish()
    }
}
