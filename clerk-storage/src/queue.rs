//! Ordered admission queue.
//!
//! Each lane admits exactly one operation at a time. Operations are queued
//! in submission order; [`Priority::High`] operations go to the head of the
//! queue but never preempt the operation already admitted. A failing
//! operation does not disturb the ones queued behind it.
//!
//! The queue is drained by a task spawned on demand. Every admitted
//! operation runs in its own task so that a panic inside a store call is
//! contained and the lane moves on.

use clerk_core::{ClerkError, ClerkResult, ConfigError, Lane, Priority};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// A queued operation, type-erased.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Lock a mutex, recovering the data if a holder panicked.
///
/// Every critical section in this crate leaves its data consistent, so a
/// poisoned lock is still safe to use.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct LaneState {
    pending: VecDeque<Job>,
    draining: bool,
    busy: bool,
}

/// Single-slot admission queue for one lane.
#[derive(Clone)]
pub struct AdmissionQueue {
    lane: Lane,
    runtime: Handle,
    state: Arc<Mutex<LaneState>>,
    admitted: Arc<AtomicU64>,
}

impl AdmissionQueue {
    /// Create a queue that spawns its work on `runtime`.
    pub fn new(lane: Lane, runtime: Handle) -> Self {
        Self {
            lane,
            runtime,
            state: Arc::new(Mutex::new(LaneState::default())),
            admitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The lane this queue serves.
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Number of operations waiting for admission.
    pub fn len(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Whether no operation is waiting for admission.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an operation currently holds the slot.
    pub fn is_busy(&self) -> bool {
        lock(&self.state).busy
    }

    /// Total operations admitted since creation.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Queue `factory` for admission and return its eventual result.
    ///
    /// The operation is enqueued before this returns and runs whether or not
    /// the returned future is polled. `factory` is invoked only when the
    /// operation is admitted.
    pub fn push<F, Fut, T>(
        &self,
        factory: F,
        priority: Priority,
    ) -> impl Future<Output = ClerkResult<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ClerkResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            async move {
                // The caller may have stopped listening; the work still counts.
                let _ = tx.send(factory().await);
            }
            .boxed()
        });
        self.enqueue(job, priority);

        let lane = self.lane;
        async move {
            rx.await
                .unwrap_or_else(|_| Err(ClerkError::Interrupted { lane }))
        }
    }

    fn enqueue(&self, job: Job, priority: Priority) {
        let mut state = lock(&self.state);
        if priority.is_high() {
            state.pending.push_front(job);
        } else {
            state.pending.push_back(job);
        }
        tracing::trace!(
            lane = %self.lane,
            ?priority,
            queued = state.pending.len(),
            "operation queued"
        );

        if !state.draining {
            state.draining = true;
            self.runtime.spawn(drain(
                self.lane,
                self.runtime.clone(),
                Arc::clone(&self.state),
                Arc::clone(&self.admitted),
            ));
        }
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("lane", &self.lane)
            .field("queued", &self.len())
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Admit queued operations one at a time until the queue is empty.
async fn drain(
    lane: Lane,
    runtime: Handle,
    state: Arc<Mutex<LaneState>>,
    admitted: Arc<AtomicU64>,
) {
    loop {
        let job = {
            let mut state = lock(&state);
            match state.pending.pop_front() {
                Some(job) => {
                    state.busy = true;
                    job
                }
                None => {
                    state.busy = false;
                    state.draining = false;
                    return;
                }
            }
        };

        let sequence = admitted.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(%lane, sequence, "operation admitted");

        if let Err(err) = runtime.spawn(job()).await {
            tracing::warn!(%lane, sequence, error = %err, "admitted operation aborted");
        }
    }
}

// ============================================================================
// LANES
// ============================================================================

/// The read and write queues used by one or more clerks.
///
/// Clerks sharing a `Lanes` value share one request budget.
#[derive(Clone, Debug)]
pub struct Lanes {
    read: AdmissionQueue,
    write: AdmissionQueue,
}

impl Lanes {
    /// Create a fresh pair of lanes on the current Tokio runtime.
    pub fn new() -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|e| ConfigError::RuntimeUnavailable {
            reason: e.to_string(),
        })?;
        Ok(Self::with_runtime(runtime))
    }

    /// Create a fresh pair of lanes on the given runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            read: AdmissionQueue::new(Lane::Read, runtime.clone()),
            write: AdmissionQueue::new(Lane::Write, runtime),
        }
    }

    /// The read lane.
    pub fn read(&self) -> &AdmissionQueue {
        &self.read
    }

    /// The write lane.
    pub fn write(&self) -> &AdmissionQueue {
        &self.write
    }

    /// Get a lane by kind.
    pub fn get(&self, lane: Lane) -> &AdmissionQueue {
        match lane {
            Lane::Read => &self.read,
            Lane::Write => &self.write,
        }
    }
}
