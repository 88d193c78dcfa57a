//! Contracts for the underlying key-value store.
//!
//! The network call itself lives outside this workspace. Implementations
//! report failures as [`StoreError`]; the clerk passes them through without
//! retrying.

use crate::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// A remote key-value store with a shared request budget.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Value returned by reads and carried by writes.
    type Value: Clone + Send + Sync + 'static;

    /// Result of a successful write (e.g. a version tag).
    type Receipt: Clone + Send + Sync + 'static;

    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Self::Value, StoreError>;

    /// Persist `value` under `key`.
    async fn set(&self, key: &str, value: Self::Value) -> Result<Self::Receipt, StoreError>;
}

/// Opens stores by name and optional scope.
pub trait StoreService: Send + Sync {
    /// The store type handed out by this service.
    type Store: KeyValueStore;

    /// Open (or reuse) the store identified by `name` and `scope`.
    fn open(&self, name: &str, scope: Option<&str>) -> Result<Arc<Self::Store>, StoreError>;
}
