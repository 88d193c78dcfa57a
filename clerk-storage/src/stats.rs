//! Usage statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one clerk.
#[derive(Debug, Default)]
pub struct ClerkStats {
    reads_requested: AtomicU64,
    reads_dispatched: AtomicU64,
    writes_requested: AtomicU64,
    writes_dispatched: AtomicU64,
    failures: AtomicU64,
}

impl ClerkStats {
    pub(crate) fn record_read_request(&self) {
        self.reads_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_dispatch(&self) {
        self.reads_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_request(&self) {
        self.writes_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_dispatch(&self) {
        self.writes_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads_requested: self.reads_requested.load(Ordering::Relaxed),
            reads_dispatched: self.reads_dispatched.load(Ordering::Relaxed),
            writes_requested: self.writes_requested.load(Ordering::Relaxed),
            writes_dispatched: self.writes_dispatched.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ClerkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Calls to `read`.
    pub reads_requested: u64,
    /// Reads that reached the store.
    pub reads_dispatched: u64,
    /// Calls to `write`.
    pub writes_requested: u64,
    /// Writes that reached the store.
    pub writes_dispatched: u64,
    /// Store calls that failed.
    pub failures: u64,
}

impl StatsSnapshot {
    /// Fraction of reads served by an existing in-flight read (0.0 to 1.0).
    pub fn read_coalesce_rate(&self) -> f64 {
        coalesce_rate(self.reads_requested, self.reads_dispatched)
    }

    /// Fraction of writes folded into another pending write (0.0 to 1.0).
    pub fn write_coalesce_rate(&self) -> f64 {
        coalesce_rate(self.writes_requested, self.writes_dispatched)
    }
}

fn coalesce_rate(requested: u64, dispatched: u64) -> f64 {
    if requested == 0 {
        0.0
    } else {
        requested.saturating_sub(dispatched) as f64 / requested as f64
    }
}
