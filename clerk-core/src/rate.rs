//! Request rate estimation.
//!
//! The store grants a per-minute request budget of a fixed base plus a
//! share for every connected participant. A clerk spends `bandwidth` of
//! that budget, one request per slot, so the minimum slot length is the
//! inverse of its per-minute rate.

use crate::Bandwidth;
use std::time::Duration;

/// Requests per minute granted regardless of load.
pub const BASE_REQUESTS_PER_MINUTE: f64 = 60.0;

/// Additional requests per minute granted per unit of load.
pub const REQUESTS_PER_LOAD_UNIT: f64 = 10.0;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Requests per minute available to a clerk at the given load.
pub fn requests_per_minute(bandwidth: Bandwidth, load: u64) -> f64 {
    (BASE_REQUESTS_PER_MINUTE + load as f64 * REQUESTS_PER_LOAD_UNIT) * bandwidth.get()
}

/// Minimum spacing between two admissions on one lane.
///
/// `60 / ((60 + load * 10) * bandwidth)` seconds. Never zero; saturates at
/// [`Duration::MAX`] for bandwidths too small to express.
pub fn minimum_interval(bandwidth: Bandwidth, load: u64) -> Duration {
    let seconds = SECONDS_PER_MINUTE / requests_per_minute(bandwidth, load);
    Duration::try_from_secs_f64(seconds)
        .unwrap_or(Duration::MAX)
        .max(Duration::from_nanos(1))
}
