use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paystream_core::{CompanyId, IdentityId};

/// A time-locked lump-sum grant. Append-only: claimed grants stay in the
/// list as history and can never be claimed again.
///
/// Each grant records the treasury account that funded its reservation, so a
/// grant outlives the stream that justified it — cancelling an employee's
/// stream leaves their unlocked grants claimable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusGrant {
    pub amount: u64,
    pub unlocks_at: DateTime<Utc>,
    pub claimed: bool,
    pub owner: IdentityId,
    pub company_id: CompanyId,
}

impl BonusGrant {
    /// Unclaimed and past its unlock time.
    pub fn claimable_at(&self, now: DateTime<Utc>) -> bool {
        !self.claimed && self.unlocks_at <= now
    }
}
