//! Write coalescing.
//!
//! A write for a key with a pending (not yet admitted) write replaces the
//! value that write will carry and shares its result. Once admitted, the
//! write first takes itself out of the pending map and only then reads its
//! value, so later writes start a fresh cycle instead of mutating a request
//! that may already be on the wire.

use super::{remove_generation, EntryMap, Generational, Generations, Pending, SettleGuard};
use crate::queue::{lock, AdmissionQueue};
use crate::stats::ClerkStats;
use crate::throttle::Throttle;
use clerk_core::{ClerkError, KeyValueStore, Priority};
use futures_util::FutureExt;
use std::sync::{Arc, Mutex};

/// A write that has been queued but not yet admitted.
struct PendingWrite<V, R> {
    generation: u64,
    value: Arc<Mutex<V>>,
    result: Pending<R>,
}

impl<V, R> Generational for PendingWrite<V, R> {
    fn generation(&self) -> u64 {
        self.generation
    }
}

type PendingWrites<S> =
    EntryMap<PendingWrite<<S as KeyValueStore>::Value, <S as KeyValueStore>::Receipt>>;

/// Collapses queued writes to the same key into one request.
pub struct WriteCoalescer<S: KeyValueStore> {
    store: Arc<S>,
    queue: AdmissionQueue,
    throttle: Throttle,
    stats: Arc<ClerkStats>,
    pending: PendingWrites<S>,
    generations: Arc<Generations>,
}

impl<S: KeyValueStore> WriteCoalescer<S> {
    pub(crate) fn new(
        store: Arc<S>,
        queue: AdmissionQueue,
        throttle: Throttle,
        stats: Arc<ClerkStats>,
    ) -> Self {
        Self {
            store,
            queue,
            throttle,
            stats,
            pending: Arc::default(),
            generations: Arc::default(),
        }
    }

    /// Write `value` to `key`, riding the pending write for it if there is one.
    ///
    /// The returned result is that of the request that actually carries this
    /// value or a later one. `priority` only places a new request; a write
    /// that joins a pending one keeps that request's queue position.
    pub fn write(&self, key: &str, value: S::Value, priority: Priority) -> Pending<S::Receipt> {
        self.stats.record_write_request();

        let mut pending = lock(&self.pending);
        if let Some(entry) = pending.get(key) {
            *lock(&entry.value) = value;
            tracing::debug!(key, generation = entry.generation, "write folded into pending request");
            return entry.result.clone();
        }

        let generation = self.generations.next();
        let cell = Arc::new(Mutex::new(value));
        let guard = SettleGuard::new(Arc::clone(&self.pending), key.to_string(), generation);
        let entries = Arc::clone(&self.pending);
        let store = Arc::clone(&self.store);
        let throttle = self.throttle.clone();
        let stats = Arc::clone(&self.stats);
        let latest = Arc::clone(&cell);

        let factory = move || {
            // Leave the map before reading the value: from here on, new
            // writes to this key queue a separate request.
            remove_generation(&mut lock(&entries), guard.key(), generation);
            let value = lock(&latest).clone();

            async move {
                let result = throttle
                    .run(|| async {
                        stats.record_write_dispatch();
                        store.set(guard.key(), value).await
                    })
                    .await;
                if let Err(err) = &result {
                    stats.record_failure();
                    tracing::debug!(key = guard.key(), error = %err, "store write failed");
                }
                guard.settle();
                result.map_err(ClerkError::from)
            }
        };

        let result = self.queue.push(factory, priority).boxed().shared();
        pending.insert(
            key.to_string(),
            PendingWrite {
                generation,
                value: cell,
                result: result.clone(),
            },
        );
        tracing::debug!(key, generation, ?priority, "write queued");
        result
    }

    /// Number of keys with a write waiting for admission.
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl<S: KeyValueStore> Clone for WriteCoalescer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            queue: self.queue.clone(),
            throttle: self.throttle.clone(),
            stats: Arc::clone(&self.stats),
            pending: Arc::clone(&self.pending),
            generations: Arc::clone(&self.generations),
        }
    }
}
