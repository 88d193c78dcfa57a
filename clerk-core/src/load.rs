//! Dynamic load signal.
//!
//! The request budget of the store depends on a live external value, such as
//! the number of connected participants. Clerks read it through
//! [`LoadSignal`] at every admission and never cache it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Synchronous, side-effect-free snapshot of the current load.
pub trait LoadSignal: Send + Sync {
    /// Current load (e.g. connected participants).
    fn current_load(&self) -> u64;
}

impl<F> LoadSignal for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn current_load(&self) -> u64 {
        self()
    }
}

/// A load that never changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedLoad(pub u64);

impl LoadSignal for FixedLoad {
    fn current_load(&self) -> u64 {
        self.0
    }
}

/// Counter of connected participants.
///
/// Share it behind an `Arc` between the code tracking connections and the
/// clerks that throttle on it.
#[derive(Debug, Default)]
pub struct ParticipantCount {
    count: AtomicU64,
}

impl ParticipantCount {
    /// Create a counter starting at `initial`.
    pub fn new(initial: u64) -> Self {
        Self {
            count: AtomicU64::new(initial),
        }
    }

    /// Record a participant joining. Returns the new count.
    pub fn join(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a participant leaving. Returns the new count.
    pub fn leave(&self) -> u64 {
        let previous = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }

    /// Overwrite the count.
    pub fn set(&self, count: u64) {
        self.count.store(count, Ordering::Relaxed);
    }

    /// Current count.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl LoadSignal for ParticipantCount {
    fn current_load(&self) -> u64 {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_load_signal() {
        let signal = || 7u64;
        assert_eq!(signal.current_load(), 7);
    }

    #[test]
    fn test_fixed_load() {
        assert_eq!(FixedLoad(3).current_load(), 3);
        assert_eq!(FixedLoad::default().current_load(), 0);
    }

    #[test]
    fn test_participant_count_join_leave() {
        let count = ParticipantCount::default();
        assert_eq!(count.join(), 1);
        assert_eq!(count.join(), 2);
        assert_eq!(count.leave(), 1);
        assert_eq!(count.leave(), 0);
        // Leaving an empty room stays at zero.
        assert_eq!(count.leave(), 0);
        assert_eq!(count.current_load(), 0);
    }

    #[test]
    fn test_participant_count_as_trait_object() {
        let count = Arc::new(ParticipantCount::new(4));
        let signal: Arc<dyn LoadSignal> = count.clone();
        count.set(12);
        assert_eq!(signal.current_load(), 12);
    }
}
