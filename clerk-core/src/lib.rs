//! Clerk Core - Types and Contracts
//!
//! Pure data types shared by the clerk runtime: errors, configuration, the
//! request rate estimator, the dynamic load signal and the contracts of the
//! injected store. This crate has no async runtime dependency.

pub mod config;
pub mod error;
pub mod load;
pub mod rate;
pub mod store;

pub use config::{Bandwidth, ClerkConfig, ENV_BANDWIDTH, ENV_SCOPE};
pub use error::{ClerkError, ClerkResult, ConfigError, StoreError};
pub use load::{FixedLoad, LoadSignal, ParticipantCount};
pub use rate::{minimum_interval, requests_per_minute};
pub use store::{KeyValueStore, StoreService};

use std::fmt;

// ============================================================================
// ENUMS
// ============================================================================

/// One of the two independent admission pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Reads from the store
    Read,
    /// Writes to the store
    Write,
}

impl Lane {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Read => "read",
            Lane::Write => "write",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue placement for a submitted operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Appended behind everything already queued
    #[default]
    Normal,
    /// Placed ahead of everything queued, behind the operation in flight
    High,
}

impl Priority {
    /// Whether this priority jumps the queue.
    pub fn is_high(&self) -> bool {
        matches!(self, Priority::High)
    }
}

impl From<bool> for Priority {
    fn from(high: bool) -> Self {
        if high {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}
