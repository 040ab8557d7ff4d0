//! Time units for entitlement math.
//!
//! All accounting is done on whole elapsed seconds. A month is fixed at 30
//! days and a year at 365 days, matching the rate denominators used when a
//! stream or yield schedule is created.

use chrono::{DateTime, Utc};

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_MONTH: u64 = 30 * SECONDS_PER_DAY;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Whole seconds from `from` to `to`, saturating at zero when `to` is earlier.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let secs = (to - from).num_seconds();
    if secs <= 0 { 0 } else { secs as u64 }
}
