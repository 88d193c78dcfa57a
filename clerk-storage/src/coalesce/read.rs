//! Read coalescing.

use super::{EntryMap, Generational, Generations, Pending, SettleGuard};
use crate::queue::{lock, AdmissionQueue};
use crate::stats::ClerkStats;
use crate::throttle::Throttle;
use clerk_core::{ClerkError, KeyValueStore, Priority};
use futures_util::FutureExt;
use std::sync::Arc;

/// A read that has been queued or is running.
struct InFlightRead<V> {
    generation: u64,
    result: Pending<V>,
}

impl<V> Generational for InFlightRead<V> {
    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Deduplicates concurrent reads of the same key.
pub struct ReadCoalescer<S: KeyValueStore> {
    store: Arc<S>,
    queue: AdmissionQueue,
    throttle: Throttle,
    stats: Arc<ClerkStats>,
    in_flight: EntryMap<InFlightRead<S::Value>>,
    generations: Arc<Generations>,
}

impl<S: KeyValueStore> ReadCoalescer<S> {
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
            in_flight: Arc::default(),
            generations: Arc::default(),
        }
    }

    /// Read `key`, joining the in-flight read for it if there is one.
    pub fn read(&self, key: &str, priority: Priority) -> Pending<S::Value> {
        self.stats.record_read_request();

        // Held across the push so a settling read can never observe the
        // queue entry without its map entry.
        let mut in_flight = lock(&self.in_flight);
        if let Some(entry) = in_flight.get(key) {
            tracing::debug!(key, "read joined in-flight request");
            return entry.result.clone();
        }

        let generation = self.generations.next();
        let guard = SettleGuard::new(Arc::clone(&self.in_flight), key.to_string(), generation);
        let store = Arc::clone(&self.store);
        let throttle = self.throttle.clone();
        let stats = Arc::clone(&self.stats);

        let factory = move || async move {
            let result = throttle
                .run(|| async {
                    stats.record_read_dispatch();
                    store.get(guard.key()).await
                })
                .await;
            if let Err(err) = &result {
                stats.record_failure();
                tracing::debug!(key = guard.key(), error = %err, "store read failed");
            }
            guard.settle();
            result.map_err(ClerkError::from)
        };

        let result = self.queue.push(factory, priority).boxed().shared();
        in_flight.insert(
            key.to_string(),
            InFlightRead {
                generation,
                result: result.clone(),
            },
        );
        tracing::debug!(key, generation, ?priority, "read queued");
        result
    }

    /// Number of keys with a read queued or running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

impl<S: KeyValueStore> Clone for ReadCoalescer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            queue: self.queue.clone(),
            throttle: self.throttle.clone(),
            stats: Arc::clone(&self.stats),
            in_flight: Arc::clone(&self.in_flight),
            generations: Arc::clone(&self.generations),
        }
    }
}
