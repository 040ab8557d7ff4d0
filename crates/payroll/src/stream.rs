use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paystream_core::units::elapsed_seconds;
use paystream_core::{CompanyId, IdentityId};

/// A live salary stream. At most one per employee; the `Option<StreamRecord>`
/// on the payroll account distinguishes "never created" from "cancelled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub owner: IdentityId,
    pub company_id: CompanyId,
    /// Derived once at creation: `monthly_amount / SECONDS_PER_MONTH`,
    /// truncated. Always > 0.
    pub rate_per_second: u64,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub withdrawn_total: u64,
    /// `monthly_amount × duration_months`; reserved in full at creation.
    pub total_allocated: u64,
    pub tax_percent: u8,
    /// Pausing blocks withdrawal, never accrual: earnings keep vesting while
    /// paused. Intentional "freeze payout, not entitlement" policy.
    pub paused: bool,
}

impl StreamRecord {
    /// Amount vested up to `now`: `rate × (min(now, ends_at) − started_at)`.
    ///
    /// Deterministic no matter how often or how late it is evaluated, and
    /// capped at the contractual total because the rate was truncated from
    /// the allocation. Repeated reads with no intervening withdrawal return
    /// the same value.
    pub fn earned_at(&self, now: DateTime<Utc>) -> u64 {
        let effective = now.min(self.ends_at);
        let elapsed = elapsed_seconds(self.started_at, effective);
        (self.rate_per_second as u128 * elapsed as u128) as u64
    }

    /// Earned minus already withdrawn; zero while paused.
    pub fn withdrawable_at(&self, now: DateTime<Utc>) -> u64 {
        if self.paused {
            return 0;
        }
        self.earned_at(now) - self.withdrawn_total
    }
}
