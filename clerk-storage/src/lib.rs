//! Clerk Storage - Throttled, Coalescing Store Access
//!
//! Sits in front of a remote key-value store whose request budget is shared
//! by every caller and grows with a live load signal. The layer:
//!
//! - never admits requests faster than the computed rate ([`Throttle`]),
//! - admits one request per lane at a time, in order ([`AdmissionQueue`]),
//! - never runs two reads of the same key at once ([`ReadCoalescer`]),
//! - folds queued writes to one key into a single request carrying the
//!   latest value ([`WriteCoalescer`]),
//! - hands every caller a shared [`Pending`] result.
//!
//! [`Clerk`] puts these together. Operations cannot be cancelled once
//! submitted and failures are never retried; callers needing a timeout wrap
//! the returned future themselves.

pub mod clerk;
pub mod coalesce;
pub mod queue;
pub mod stats;
pub mod throttle;

pub use clerk::Clerk;
pub use coalesce::{Pending, ReadCoalescer, WriteCoalescer};
pub use queue::{AdmissionQueue, Lanes};
pub use stats::{ClerkStats, StatsSnapshot};
pub use throttle::Throttle;

// Re-export core types for convenience
pub use clerk_core::{
    Bandwidth, ClerkConfig, ClerkError, ClerkResult, ConfigError, FixedLoad, KeyValueStore, Lane,
    LoadSignal, ParticipantCount, Priority, StoreError, StoreService,
};
