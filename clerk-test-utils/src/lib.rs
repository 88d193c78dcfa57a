//! Clerk Test Utilities
//!
//! Shared test infrastructure for the clerk workspace:
//! - A recording in-memory store with latency and failure injection
//! - A store service double
//! - Proptest generators
//! - Test tracing setup

// Re-export core types for convenience
pub use clerk_core::{
    Bandwidth, ClerkConfig, ClerkError, ClerkResult, ConfigError, FixedLoad, KeyValueStore,
    LoadSignal, ParticipantCount, StoreError, StoreService,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// RECORDING STORE
// ============================================================================

/// Kind of store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Set,
}

/// One call made against [`MockStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub key: String,
    /// Value carried by a `Set`.
    pub value: Option<String>,
    /// When the call started (Tokio clock, so paused time is respected).
    pub at: Instant,
}

/// In-memory key-value store that records every call.
///
/// Values are `Option<String>`: reading a missing key yields `None` and
/// writing `None` deletes. A write returns the key's new version number.
#[derive(Debug, Default)]
pub struct MockStore {
    data: Mutex<HashMap<String, String>>,
    versions: Mutex<HashMap<String, u64>>,
    failures: Mutex<HashMap<String, StoreError>>,
    calls: Mutex<Vec<StoreCall>>,
    read_latency: Mutex<Duration>,
    write_latency: Mutex<Duration>,
    recorded: Notify,
}

impl MockStore {
    /// Create an empty store with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose calls each take `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        let store = Self::default();
        store.set_latency(latency);
        store
    }

    /// Change the duration of subsequent calls.
    pub fn set_latency(&self, latency: Duration) {
        self.set_read_latency(latency);
        self.set_write_latency(latency);
    }

    /// Change the duration of subsequent `get` calls.
    pub fn set_read_latency(&self, latency: Duration) {
        *lock(&self.read_latency) = latency;
    }

    /// Change the duration of subsequent `set` calls.
    pub fn set_write_latency(&self, latency: Duration) {
        *lock(&self.write_latency) = latency;
    }

    /// Seed a value without recording a call.
    pub fn insert(&self, key: &str, value: &str) {
        self.bump_version(key);
        lock(&self.data).insert(key.to_string(), value.to_string());
    }

    /// Make every call touching `key` fail with `error`.
    pub fn fail_key(&self, key: &str, error: StoreError) {
        lock(&self.failures).insert(key.to_string(), error);
    }

    /// Stop failing calls touching `key`.
    pub fn heal_key(&self, key: &str) {
        lock(&self.failures).remove(key);
    }

    /// Current stored value, bypassing call recording.
    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.data).get(key).cloned()
    }

    /// All calls so far, in start order.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of `Get` calls for `key`.
    pub fn get_calls(&self, key: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.op == StoreOp::Get && call.key == key)
            .count()
    }

    /// Values carried by `Set` calls for `key`, in order.
    pub fn set_calls(&self, key: &str) -> Vec<Option<String>> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.op == StoreOp::Set && call.key == key)
            .map(|call| call.value.clone())
            .collect()
    }

    /// Start times of all calls, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.calls).iter().map(|call| call.at).collect()
    }

    /// Wait until at least `count` calls have started.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.recorded.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.call_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn record(&self, op: StoreOp, key: &str, value: Option<String>) {
        lock(&self.calls).push(StoreCall {
            op,
            key: key.to_string(),
            value,
            at: Instant::now(),
        });
        self.recorded.notify_waiters();
    }

    fn bump_version(&self, key: &str) -> u64 {
        let mut versions = lock(&self.versions);
        let version = versions.entry(key.to_string()).or_insert(0);
        *version += 1;
        *version
    }

    async fn simulate_latency(&self, op: StoreOp) {
        let latency = match op {
            StoreOp::Get => *lock(&self.read_latency),
            StoreOp::Set => *lock(&self.write_latency),
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn failure(&self, key: &str) -> Option<StoreError> {
        lock(&self.failures).get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    type Value = Option<String>;
    type Receipt = u64;

    async fn get(&self, key: &str) -> Result<Self::Value, StoreError> {
        self.record(StoreOp::Get, key, None);
        self.simulate_latency(StoreOp::Get).await;
        if let Some(err) = self.failure(key) {
            return Err(err);
        }
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: Self::Value) -> Result<Self::Receipt, StoreError> {
        self.record(StoreOp::Set, key, value.clone());
        self.simulate_latency(StoreOp::Set).await;
        if let Some(err) = self.failure(key) {
            return Err(err);
        }
        let version = self.bump_version(key);
        let mut data = lock(&self.data);
        match value {
            Some(value) => {
                data.insert(key.to_string(), value);
            }
            None => {
                data.remove(key);
            }
        }
        Ok(version)
    }
}

// ============================================================================
// STORE SERVICE
// ============================================================================

/// Hands out one [`MockStore`] per `(name, scope)` pair.
#[derive(Debug, Default)]
pub struct MockStoreService {
    stores: Mutex<HashMap<(String, Option<String>), Arc<MockStore>>>,
    unavailable: bool,
}

impl MockStoreService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service whose `open` always fails.
    pub fn unavailable() -> Self {
        Self {
            stores: Mutex::default(),
            unavailable: true,
        }
    }

    /// Number of distinct stores opened.
    pub fn opened(&self) -> usize {
        lock(&self.stores).len()
    }
}

impl StoreService for MockStoreService {
    type Store = MockStore;

    fn open(&self, name: &str, scope: Option<&str>) -> Result<Arc<MockStore>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable {
                reason: format!("cannot open store {}", name),
            });
        }
        let key = (name.to_string(), scope.map(str::to_string));
        Ok(Arc::clone(lock(&self.stores).entry(key).or_default()))
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for clerk inputs.

    use proptest::prelude::*;

    /// Generate a store key.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    /// Generate a stored value.
    pub fn arb_value() -> impl Strategy<Value = String> {
        "[ -~]{0,32}"
    }

    /// Generate a valid bandwidth fraction in (0, 1].
    pub fn arb_bandwidth() -> impl Strategy<Value = f64> {
        prop_oneof![Just(1.0), 0.001f64..1.0]
    }

    /// Generate a bandwidth fraction that must be rejected.
    pub fn arb_invalid_bandwidth() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            Just(f64::NAN),
            -1000.0f64..=0.0,
            1.000_001f64..1000.0,
        ]
    }

    /// Generate a sequence of priority flags.
    pub fn arb_priorities(max_len: usize) -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(any::<bool>(), 0..=max_len)
    }
}

// ============================================================================
// TESTS
// ============================================================================
