//! Request coalescing.
//!
//! Concurrent requests for the same key share one store call. Reads share
//! the in-flight read; writes ride the pending write, which carries the most
//! recent value when it is finally admitted.
//!
//! Map entries carry a generation number. An entry is only ever removed by
//! the operation that created it, so an old operation settling late cannot
//! evict a newer entry for the same key.

mod read;
mod write;

pub use read::ReadCoalescer;
pub use write::WriteCoalescer;

use crate::queue::lock;
use clerk_core::ClerkResult;
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A result shared by every caller of a coalesced operation.
///
/// Clone it freely; all clones observe the same settlement.
pub type Pending<T> = Shared<BoxFuture<'static, ClerkResult<T>>>;

/// Entries keyed by store key.
pub(crate) type EntryMap<E> = Arc<Mutex<HashMap<String, E>>>;

/// A map entry tagged with the generation that created it.
pub(crate) trait Generational {
    fn generation(&self) -> u64;
}

/// Monotonic source of entry generations.
#[derive(Debug, Default)]
pub(crate) struct Generations(AtomicU64);

impl Generations {
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Removes one map entry when the owning operation settles or is dropped.
pub(crate) struct SettleGuard<E: Generational> {
    entries: EntryMap<E>,
    key: String,
    generation: u64,
}

impl<E: Generational> SettleGuard<E> {
    pub(crate) fn new(entries: EntryMap<E>, key: String, generation: u64) -> Self {
        Self {
            entries,
            key,
            generation,
        }
    }

    /// Remove the entry now. Idempotent.
    pub(crate) fn settle(&self) {
        let mut entries = lock(&self.entries);
        remove_generation(&mut entries, &self.key, self.generation);
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

impl<E: Generational> Drop for SettleGuard<E> {
    fn drop(&mut self) {
        self.settle();
    }
}

/// Remove `key` only if it still holds the given generation.
pub(crate) fn remove_generation<E: Generational>(
    entries: &mut HashMap<String, E>,
    key: &str,
    generation: u64,
) -> Option<E> {
    match entries.get(key) {
        Some(entry) if entry.generation() == generation => entries.remove(key),
        _ => None,
    }
}
