//! Property-Based Tests for Admission and Coalescing
//!
//! **Property 1: Lane ordering**
//!
//! For any mix of normal and high-priority operations queued behind a
//! running operation, high-priority operations run first (most recent
//! first), then normal operations in submission order.
//!
//! **Property 2: Write collapse**
//!
//! For any sequence of writes to one key issued before admission, exactly one
//! store write happens and it carries the last value.
//!
//! **Property 3: Read sharing**
//!
//! For any number of concurrent reads of one key, exactly one store read
//! happens and every caller observes its result.
//!
//! **Property 4: Bandwidth validation**
//!
//! Any bandwidth outside (0, 1] is rejected at construction.

use clerk_storage::{
    AdmissionQueue, Clerk, ClerkConfig, ClerkError, ConfigError, FixedLoad, Lane, Priority,
};
use clerk_test_utils::generators::{
    arb_bandwidth, arb_invalid_bandwidth, arb_key, arb_priorities, arb_value,
};
use clerk_test_utils::MockStore;
use futures_util::future::join_all;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("Failed to create runtime")
}

/// Expected admission order for operations queued behind a running one.
fn expected_order(flags: &[bool]) -> Vec<usize> {
    let mut high: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, high)| **high)
        .map(|(i, _)| i)
        .collect();
    high.reverse();
    let normal = flags
        .iter()
        .enumerate()
        .filter(|(_, high)| !**high)
        .map(|(i, _)| i);
    high.into_iter().chain(normal).collect()
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lane_ordering(flags in arb_priorities(12)) {
        let rt = paused_runtime();
        let order = rt.block_on(async {
            let queue = AdmissionQueue::new(Lane::Write, tokio::runtime::Handle::current());
            let log = Arc::new(Mutex::new(Vec::new()));
            let started = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());

            let blocker = {
                let started = Arc::clone(&started);
                let release = Arc::clone(&release);
                queue.push(
                    move || async move {
                        started.notify_one();
                        release.notified().await;
                        Ok(())
                    },
                    Priority::Normal,
                )
            };
            started.notified().await;

            let pushed: Vec<_> = flags
                .iter()
                .enumerate()
                .map(|(i, high)| {
                    let log = Arc::clone(&log);
                    queue.push(
                        move || async move {
                            log.lock().unwrap().push(i);
                            Ok(())
                        },
                        Priority::from(*high),
                    )
                })
                .collect();

            release.notify_one();
            blocker.await.unwrap();
            for result in join_all(pushed).await {
                result.unwrap();
            }
            let order = log.lock().unwrap().clone();
            order
        });

        prop_assert_eq!(order, expected_order(&flags));
    }

    #[test]
    fn prop_writes_collapse_to_last_value(
        key in arb_key(),
        values in prop::collection::vec(arb_value(), 1..8),
    ) {
        let rt = paused_runtime();
        let (results, sets) = rt.block_on(async {
            let store = Arc::new(MockStore::new());
            let clerk = Clerk::new(ClerkConfig::new("PlayerData"), Arc::clone(&store), Arc::new(FixedLoad(0)))
                .expect("valid config");

            let writes: Vec<_> = values
                .iter()
                .map(|v| clerk.write(&key, Some(v.clone())))
                .collect();
            let results = join_all(writes).await;
            (results, store.set_calls(&key))
        });

        let last = values.last().cloned();
        prop_assert_eq!(sets, vec![last]);
        prop_assert!(results.iter().all(|r| *r == Ok(1)));
    }

    #[test]
    fn prop_concurrent_reads_share_result(
        key in arb_key(),
        stored in arb_value(),
        readers in 1usize..10,
        bandwidth in arb_bandwidth(),
    ) {
        let rt = paused_runtime();
        let (results, calls) = rt.block_on(async {
            let store = Arc::new(MockStore::new());
            store.insert(&key, &stored);
            let clerk = Clerk::new(
                ClerkConfig::new("PlayerData").with_bandwidth(bandwidth),
                Arc::clone(&store),
                Arc::new(FixedLoad(3)),
            )
            .expect("valid config");

            let reads: Vec<_> = (0..readers).map(|_| clerk.read(&key)).collect();
            let results = join_all(reads).await;
            (results, store.get_calls(&key))
        });

        prop_assert_eq!(calls, 1);
        prop_assert_eq!(results.len(), readers);
        prop_assert!(results.iter().all(|r| *r == Ok(Some(stored.clone()))));
    }

    #[test]
    fn prop_invalid_bandwidth_rejected(bandwidth in arb_invalid_bandwidth()) {
        let result = Clerk::new(
            ClerkConfig::new("PlayerData").with_bandwidth(bandwidth),
            Arc::new(MockStore::new()),
            Arc::new(FixedLoad(0)),
        );
        prop_assert!(matches!(
            result,
            Err(ClerkError::Config(ConfigError::InvalidValue { .. }))
        ), "expected InvalidValue config error");
    }
}

#[test]
fn test_expected_order_model() {
    assert_eq!(expected_order(&[false, true, false, true]), vec![3, 1, 0, 2]);
    assert!(expected_order(&[]).is_empty());
}
