//! The clerk: a rate-limited, coalescing front for a key-value store.
//!
//! Reads and writes each go through their own coalescer and admission lane:
//!
//! ```text
//! caller -> coalescer -> admission queue -> throttle -> store
//!                                                         |
//!           every caller sharing the entry  <-  result ---+
//! ```
//!
//! # Example
//!
//! ```ignore
//! let participants = Arc::new(ParticipantCount::default());
//! let clerk = Clerk::new(
//!     ClerkConfig::new("PlayerData").with_bandwidth(0.5),
//!     store,
//!     participants.clone(),
//! )?;
//!
//! // Both callers share one store read.
//! let (a, b) = tokio::join!(clerk.read("player_1"), clerk.read("player_1"));
//!
//! // Only "v3" is sent; all three callers get its receipt.
//! let w1 = clerk.write("player_1", "v1".into());
//! let w2 = clerk.write("player_1", "v2".into());
//! let w3 = clerk.write("player_1", "v3".into());
//! ```

use crate::coalesce::{Pending, ReadCoalescer, WriteCoalescer};
use crate::queue::Lanes;
use crate::stats::{ClerkStats, StatsSnapshot};
use crate::throttle::Throttle;
use clerk_core::{
    Bandwidth, ClerkConfig, ClerkResult, KeyValueStore, LoadSignal, Priority, StoreService,
};
use std::sync::Arc;
use std::time::Duration;

/// Rate-limited, coalescing access to one store.
///
/// Cloning is cheap and clones share all state.
pub struct Clerk<S: KeyValueStore> {
    name: Arc<str>,
    scope: Option<Arc<str>>,
    throttle: Throttle,
    lanes: Lanes,
    reads: ReadCoalescer<S>,
    writes: WriteCoalescer<S>,
    stats: Arc<ClerkStats>,
}

impl<S: KeyValueStore> Clerk<S> {
    /// Create a clerk with its own pair of lanes on the current runtime.
    ///
    /// Fails with a configuration error if the bandwidth is outside
    /// `(0, 1]` or no Tokio runtime is running.
    pub fn new(config: ClerkConfig, store: Arc<S>, load: Arc<dyn LoadSignal>) -> ClerkResult<Self> {
        let bandwidth = config.validate()?;
        let lanes = Lanes::new()?;
        Ok(Self::assemble(config, bandwidth, store, load, lanes))
    }

    /// Create a clerk on lanes shared with other clerks.
    ///
    /// All clerks on the same lanes are admitted one at a time per lane,
    /// each spacing its own requests by its own bandwidth.
    pub fn with_lanes(
        config: ClerkConfig,
        store: Arc<S>,
        load: Arc<dyn LoadSignal>,
        lanes: Lanes,
    ) -> ClerkResult<Self> {
        let bandwidth = config.validate()?;
        Ok(Self::assemble(config, bandwidth, store, load, lanes))
    }

    /// Create a clerk for the store `config` names, opened through `service`.
    pub fn open<P>(config: ClerkConfig, service: &P, load: Arc<dyn LoadSignal>) -> ClerkResult<Self>
    where
        P: StoreService<Store = S>,
    {
        let bandwidth = config.validate()?;
        let store = service.open(&config.name, config.scope.as_deref())?;
        let lanes = Lanes::new()?;
        Ok(Self::assemble(config, bandwidth, store, load, lanes))
    }

    /// Wire up an already validated config.
    fn assemble(
        config: ClerkConfig,
        bandwidth: Bandwidth,
        store: Arc<S>,
        load: Arc<dyn LoadSignal>,
        lanes: Lanes,
    ) -> Self {
        let throttle = Throttle::new(bandwidth, load);
        let stats = Arc::new(ClerkStats::default());

        let reads = ReadCoalescer::new(
            Arc::clone(&store),
            lanes.read().clone(),
            throttle.clone(),
            Arc::clone(&stats),
        );
        let writes = WriteCoalescer::new(
            store,
            lanes.write().clone(),
            throttle.clone(),
            Arc::clone(&stats),
        );

        tracing::debug!(
            name = %config.name,
            scope = config.scope.as_deref().unwrap_or(""),
            %bandwidth,
            "clerk created"
        );

        Self {
            name: config.name.into(),
            scope: config.scope.map(Into::into),
            throttle,
            lanes,
            reads,
            writes,
            stats,
        }
    }

    /// Read `key`.
    pub fn read(&self, key: &str) -> Pending<S::Value> {
        self.reads.read(key, Priority::Normal)
    }

    /// Read `key`, optionally ahead of queued reads.
    pub fn read_with_priority(&self, key: &str, priority: Priority) -> Pending<S::Value> {
        self.reads.read(key, priority)
    }

    /// Write `value` to `key`.
    pub fn write(&self, key: &str, value: S::Value) -> Pending<S::Receipt> {
        self.writes.write(key, value, Priority::Normal)
    }

    /// Write `value` to `key`, optionally ahead of queued writes.
    pub fn write_with_priority(
        &self,
        key: &str,
        value: S::Value,
        priority: Priority,
    ) -> Pending<S::Receipt> {
        self.writes.write(key, value, priority)
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store scope.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Bandwidth fraction in use.
    pub fn bandwidth(&self) -> Bandwidth {
        self.throttle.bandwidth()
    }

    /// Minimum slot length at the current load.
    pub fn minimum_interval(&self) -> Duration {
        self.throttle.minimum_interval()
    }

    /// Keys with a read queued or running.
    pub fn pending_reads(&self) -> usize {
        self.reads.in_flight()
    }

    /// Keys with a write waiting for admission.
    pub fn pending_writes(&self) -> usize {
        self.writes.pending()
    }

    /// The lanes this clerk is admitted through.
    pub fn lanes(&self) -> &Lanes {
        &self.lanes
    }

    /// Usage counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<S: KeyValueStore> Clone for Clerk<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            scope: self.scope.clone(),
            throttle: self.throttle.clone(),
            lanes: self.lanes.clone(),
            reads: self.reads.clone(),
            writes: self.writes.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<S: KeyValueStore> std::fmt::Debug for Clerk<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clerk")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("bandwidth", &self.bandwidth())
            .field("pending_reads", &self.pending_reads())
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}
