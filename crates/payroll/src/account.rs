use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use paystream_core::units::SECONDS_PER_MONTH;
use paystream_core::{Aggregate, AggregateRoot, CompanyId, IdentityId, LedgerError};
use paystream_events::Event;

/// Aggregate root: one employee's payroll position — the live stream (if
/// any) plus the append-only bonus grant list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayrollAccount {
    employee: IdentityId,
    stream: Option<crate::StreamRecord>,
    bonuses: Vec<crate::BonusGrant>,
    version: u64,
}

impl PayrollAccount {
    /// Empty aggregate: an identity that has never been streamed to.
    pub fn empty(employee: IdentityId) -> Self {
        Self {
            employee,
            stream: None,
            bonuses: Vec::new(),
            version: 0,
        }
    }

    pub fn employee(&self) -> IdentityId {
        self.employee
    }

    pub fn stream(&self) -> Option<&crate::StreamRecord> {
        self.stream.as_ref()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn bonuses(&self) -> &[crate::BonusGrant] {
        &self.bonuses
    }

    /// Amount vested up to `now`; zero without a live stream.
    pub fn earned_at(&self, now: DateTime<Utc>) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.earned_at(now))
    }

    /// Earned minus withdrawn; zero while paused or without a live stream.
    pub fn withdrawable_at(&self, now: DateTime<Utc>) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.withdrawable_at(now))
    }

    /// Sum of all unclaimed grants whose unlock time has passed.
    pub fn pending_bonus_total(&self, now: DateTime<Utc>) -> u64 {
        self.bonuses
            .iter()
            .filter(|g| g.claimable_at(now))
            .map(|g| g.amount)
            .sum()
    }

    fn claimable_indices(&self, now: DateTime<Utc>) -> Vec<u32> {
        self.bonuses
            .iter()
            .enumerate()
            .filter(|(_, g)| g.claimable_at(now))
            .map(|(i, _)| i as u32)
            .collect()
    }
}

impl AggregateRoot for PayrollAccount {
    type Id = IdentityId;

    fn id(&self) -> &Self::Id {
        &self.employee
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayrollCommand {
    /// Open a stream and derive its per-second rate. The full allocation
    /// must be reserved in the employer's treasury in the same commit.
    CreateStream {
        owner: IdentityId,
        company_id: CompanyId,
        monthly_amount: u64,
        duration_months: u64,
        tax_percent: u8,
        occurred_at: DateTime<Utc>,
    },
    /// Pay out everything currently due: vested salary plus every unlocked
    /// unclaimed grant, split into net and tax.
    Withdraw { occurred_at: DateTime<Utc> },
    Pause { occurred_at: DateTime<Utc> },
    Resume { occurred_at: DateTime<Utc> },
    /// Destroy the stream, forfeiting unvested allocation back to the
    /// employer. Grants are untouched.
    Cancel { occurred_at: DateTime<Utc> },
    ScheduleBonus {
        amount: u64,
        unlocks_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCreated {
    pub employee: IdentityId,
    pub owner: IdentityId,
    pub company_id: CompanyId,
    pub monthly_amount: u64,
    pub duration_months: u64,
    pub rate_per_second: u64,
    pub total_allocated: u64,
    pub tax_percent: u8,
    pub ends_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// The transition record of a withdrawal: gross base from the stream, the
/// indices of every grant claimed alongside it, and the resulting tax split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub employee: IdentityId,
    /// Company whose tax vault receives `tax_amount`.
    pub company_id: CompanyId,
    pub gross_base: u64,
    pub bonus_indices: Vec<u32>,
    pub gross_total: u64,
    pub tax_amount: u64,
    pub net_amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPaused {
    pub employee: IdentityId,
    pub company_id: CompanyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamResumed {
    pub employee: IdentityId,
    pub company_id: CompanyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCancelled {
    pub employee: IdentityId,
    pub company_id: CompanyId,
    pub earned: u64,
    /// `total_allocated − earned`: the unvested remainder returned to the
    /// employer's available capital.
    pub released: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusScheduled {
    pub employee: IdentityId,
    pub owner: IdentityId,
    pub company_id: CompanyId,
    pub index: u32,
    pub amount: u64,
    pub unlocks_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayrollEvent {
    StreamCreated(StreamCreated),
    Withdrawn(Withdrawn),
    StreamPaused(StreamPaused),
    StreamResumed(StreamResumed),
    StreamCancelled(StreamCancelled),
    BonusScheduled(BonusScheduled),
}

impl PayrollEvent {
    pub fn employee(&self) -> IdentityId {
        match self {
            PayrollEvent::StreamCreated(e) => e.employee,
            PayrollEvent::Withdrawn(e) => e.employee,
            PayrollEvent::StreamPaused(e) => e.employee,
            PayrollEvent::StreamResumed(e) => e.employee,
            PayrollEvent::StreamCancelled(e) => e.employee,
            PayrollEvent::BonusScheduled(e) => e.employee,
        }
    }

    pub fn company_id(&self) -> CompanyId {
        match self {
            PayrollEvent::StreamCreated(e) => e.company_id,
            PayrollEvent::Withdrawn(e) => e.company_id,
            PayrollEvent::StreamPaused(e) => e.company_id,
            PayrollEvent::StreamResumed(e) => e.company_id,
            PayrollEvent::StreamCancelled(e) => e.company_id,
            PayrollEvent::BonusScheduled(e) => e.company_id,
        }
    }
}

impl Event for PayrollEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PayrollEvent::StreamCreated(_) => "payroll.stream.created",
            PayrollEvent::Withdrawn(_) => "payroll.stream.withdrawn",
            PayrollEvent::StreamPaused(_) => "payroll.stream.paused",
            PayrollEvent::StreamResumed(_) => "payroll.stream.resumed",
            PayrollEvent::StreamCancelled(_) => "payroll.stream.cancelled",
            PayrollEvent::BonusScheduled(_) => "payroll.bonus.scheduled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PayrollEvent::StreamCreated(e) => e.occurred_at,
            PayrollEvent::Withdrawn(e) => e.occurred_at,
            PayrollEvent::StreamPaused(e) => e.occurred_at,
            PayrollEvent::StreamResumed(e) => e.occurred_at,
            PayrollEvent::StreamCancelled(e) => e.occurred_at,
            PayrollEvent::BonusScheduled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PayrollAccount {
    type Command = PayrollCommand;
    type Event = PayrollEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PayrollEvent::StreamCreated(e) => {
                self.stream = Some(crate::StreamRecord {
                    owner: e.owner,
                    company_id: e.company_id,
                    rate_per_second: e.rate_per_second,
                    started_at: e.occurred_at,
                    ends_at: e.ends_at,
                    withdrawn_total: 0,
                    total_allocated: e.total_allocated,
                    tax_percent: e.tax_percent,
                    paused: false,
                });
            }
            PayrollEvent::Withdrawn(e) => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.withdrawn_total += e.gross_base;
                }
                for idx in &e.bonus_indices {
                    self.bonuses[*idx as usize].claimed = true;
                }
            }
            PayrollEvent::StreamPaused(_) => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.paused = true;
                }
            }
            PayrollEvent::StreamResumed(_) => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.paused = false;
                }
            }
            PayrollEvent::StreamCancelled(_) => {
                self.stream = None;
            }
            PayrollEvent::BonusScheduled(e) => {
                self.bonuses.push(crate::BonusGrant {
                    amount: e.amount,
                    unlocks_at: e.unlocks_at,
                    claimed: false,
                    owner: e.owner,
                    company_id: e.company_id,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PayrollCommand::CreateStream {
                owner,
                company_id,
                monthly_amount,
                duration_months,
                tax_percent,
                occurred_at,
            } => self.handle_create(
                *owner,
                *company_id,
                *monthly_amount,
                *duration_months,
                *tax_percent,
                *occurred_at,
            ),
            PayrollCommand::Withdraw { occurred_at } => self.handle_withdraw(*occurred_at),
            PayrollCommand::Pause { occurred_at } => {
                let stream = self.require_stream()?;
                if stream.paused {
                    return Err(LedgerError::conflict("stream already paused"));
                }
                Ok(vec![PayrollEvent::StreamPaused(StreamPaused {
                    employee: self.employee,
                    company_id: stream.company_id,
                    occurred_at: *occurred_at,
                })])
            }
            PayrollCommand::Resume { occurred_at } => {
                let stream = self.require_stream()?;
                if !stream.paused {
                    return Err(LedgerError::conflict("stream is not paused"));
                }
                Ok(vec![PayrollEvent::StreamResumed(StreamResumed {
                    employee: self.employee,
                    company_id: stream.company_id,
                    occurred_at: *occurred_at,
                })])
            }
            PayrollCommand::Cancel { occurred_at } => {
                let stream = self.require_stream()?;
                let earned = stream.earned_at(*occurred_at);
                Ok(vec![PayrollEvent::StreamCancelled(StreamCancelled {
                    employee: self.employee,
                    company_id: stream.company_id,
                    earned,
                    released: stream.total_allocated - earned,
                    occurred_at: *occurred_at,
                })])
            }
            PayrollCommand::ScheduleBonus {
                amount,
                unlocks_at,
                occurred_at,
            } => {
                let stream = self.require_stream()?;
                if *amount == 0 {
                    return Err(LedgerError::invalid_argument("bonus amount must be positive"));
                }
                if *unlocks_at <= *occurred_at {
                    return Err(LedgerError::invalid_argument(
                        "bonus unlock time must be in the future",
                    ));
                }
                Ok(vec![PayrollEvent::BonusScheduled(BonusScheduled {
                    employee: self.employee,
                    owner: stream.owner,
                    company_id: stream.company_id,
                    index: self.bonuses.len() as u32,
                    amount: *amount,
                    unlocks_at: *unlocks_at,
                    occurred_at: *occurred_at,
                })])
            }
        }
    }
}

impl PayrollAccount {
    fn require_stream(&self) -> Result<&crate::StreamRecord, LedgerError> {
        self.stream
            .as_ref()
            .ok_or_else(|| LedgerError::not_found("no active stream for employee"))
    }

    fn handle_create(
        &self,
        owner: IdentityId,
        company_id: CompanyId,
        monthly_amount: u64,
        duration_months: u64,
        tax_percent: u8,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<PayrollEvent>, LedgerError> {
        if self.employee.is_nil() {
            return Err(LedgerError::invalid_argument("employee identity must not be nil"));
        }
        if self.stream.is_some() {
            return Err(LedgerError::conflict("employee already has an active stream"));
        }
        if monthly_amount == 0 {
            return Err(LedgerError::invalid_argument("monthly amount must be positive"));
        }
        if duration_months == 0 {
            return Err(LedgerError::invalid_argument("duration must be at least one month"));
        }
        if tax_percent > 100 {
            return Err(LedgerError::invalid_argument("tax percent must not exceed 100"));
        }

        let rate_per_second = monthly_amount / SECONDS_PER_MONTH;
        if rate_per_second == 0 {
            return Err(LedgerError::invalid_argument(
                "monthly amount too low to stream per second",
            ));
        }

        let total_allocated = monthly_amount
            .checked_mul(duration_months)
            .ok_or_else(|| LedgerError::invalid_argument("allocation overflows"))?;
        let duration_seconds = duration_months
            .checked_mul(SECONDS_PER_MONTH)
            .and_then(|s| i64::try_from(s).ok())
            .ok_or_else(|| LedgerError::invalid_argument("stream duration overflows"))?;

        Ok(vec![PayrollEvent::StreamCreated(StreamCreated {
            employee: self.employee,
            owner,
            company_id,
            monthly_amount,
            duration_months,
            rate_per_second,
            total_allocated,
            tax_percent,
            ends_at: occurred_at + Duration::seconds(duration_seconds),
            occurred_at,
        })])
    }

    fn handle_withdraw(&self, now: DateTime<Utc>) -> Result<Vec<PayrollEvent>, LedgerError> {
        if self.stream.is_none() && self.bonuses.is_empty() {
            return Err(LedgerError::not_found("no active stream for employee"));
        }
        if let Some(stream) = self.stream.as_ref() {
            if stream.paused {
                return Err(LedgerError::conflict("stream is paused"));
            }
        }

        let gross_base = self.withdrawable_at(now);
        let bonus_indices = self.claimable_indices(now);
        let bonus_total: u64 = bonus_indices
            .iter()
            .map(|i| self.bonuses[*i as usize].amount)
            .sum();

        let gross_total = gross_base
            .checked_add(bonus_total)
            .ok_or_else(|| LedgerError::invalid_argument("withdrawal amount overflows"))?;
        if gross_total == 0 {
            return Err(LedgerError::nothing_to_claim("nothing withdrawable"));
        }

        // The tax vault is the live stream's company; a bonus-only payout
        // after cancellation is untaxed (no stream tax rate exists).
        let (company_id, tax_percent) = match self.stream.as_ref() {
            Some(stream) => (stream.company_id, stream.tax_percent),
            None => (self.bonuses[bonus_indices[0] as usize].company_id, 0),
        };

        // Truncating division: tax rounds down in the employee's favor.
        let tax_amount = (gross_total as u128 * tax_percent as u128 / 100) as u64;

        Ok(vec![PayrollEvent::Withdrawn(Withdrawn {
            employee: self.employee,
            company_id,
            gross_base,
            bonus_indices,
            gross_total,
            tax_amount,
            net_amount: gross_total - tax_amount,
            occurred_at: now,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paystream_core::units::{SECONDS_PER_DAY, SECONDS_PER_MONTH};
    use proptest::prelude::*;

    const MONTHLY: u64 = 10 * SECONDS_PER_MONTH; // rate of 10 per second

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn apply_all(account: &mut PayrollAccount, events: Vec<PayrollEvent>) {
        for e in &events {
            account.apply(e);
        }
    }

    fn created_account(tax_percent: u8) -> PayrollAccount {
        let mut account = PayrollAccount::empty(IdentityId::new());
        let events = account
            .handle(&PayrollCommand::CreateStream {
                owner: IdentityId::new(),
                company_id: CompanyId::new(1),
                monthly_amount: MONTHLY,
                duration_months: 10,
                tax_percent,
                occurred_at: at(0),
            })
            .unwrap();
        apply_all(&mut account, events);
        account
    }

    #[test]
    fn create_rejects_bad_arguments() {
        let account = PayrollAccount::empty(IdentityId::new());
        let base = |monthly, months, tax| PayrollCommand::CreateStream {
            owner: IdentityId::new(),
            company_id: CompanyId::new(1),
            monthly_amount: monthly,
            duration_months: months,
            tax_percent: tax,
            occurred_at: at(0),
        };

        assert!(matches!(
            account.handle(&base(0, 10, 10)).unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));
        assert!(matches!(
            account.handle(&base(MONTHLY, 0, 10)).unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));
        assert!(matches!(
            account.handle(&base(MONTHLY, 10, 101)).unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));
        // A monthly amount below SECONDS_PER_MONTH truncates to a zero rate.
        assert!(matches!(
            account.handle(&base(100, 10, 10)).unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));

        let nil = PayrollAccount::empty(IdentityId::nil());
        assert!(matches!(
            nil.handle(&base(MONTHLY, 10, 10)).unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));
    }

    #[test]
    fn duplicate_stream_is_a_conflict() {
        let account = created_account(10);
        let err = account
            .handle(&PayrollCommand::CreateStream {
                owner: IdentityId::new(),
                company_id: CompanyId::new(2),
                monthly_amount: MONTHLY,
                duration_months: 1,
                tax_percent: 0,
                occurred_at: at(5),
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn withdraw_splits_tax_with_truncation_in_the_employees_favor() {
        let mut account = created_account(10);
        // 33 seconds at rate 10 → gross 330, tax 33, net 297.
        let events = account
            .handle(&PayrollCommand::Withdraw { occurred_at: at(33) })
            .unwrap();
        match &events[0] {
            PayrollEvent::Withdrawn(w) => {
                assert_eq!(w.gross_base, 330);
                assert_eq!(w.gross_total, 330);
                assert_eq!(w.tax_amount, 33);
                assert_eq!(w.net_amount, 297);
                assert!(w.bonus_indices.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        apply_all(&mut account, events);
        assert_eq!(account.stream().unwrap().withdrawn_total, 330);
        assert_eq!(account.withdrawable_at(at(33)), 0);
    }

    #[test]
    fn tax_truncates_downward() {
        let mut account = created_account(7);
        // 3 seconds at rate 10 → gross 30, tax = 30*7/100 = 2 (2.1 truncated).
        let events = account
            .handle(&PayrollCommand::Withdraw { occurred_at: at(3) })
            .unwrap();
        match &events[0] {
            PayrollEvent::Withdrawn(w) => {
                assert_eq!(w.tax_amount, 2);
                assert_eq!(w.net_amount, 28);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        apply_all(&mut account, events);
    }

    #[test]
    fn withdraw_with_nothing_due_is_rejected() {
        let account = created_account(10);
        let err = account
            .handle(&PayrollCommand::Withdraw { occurred_at: at(0) })
            .unwrap_err();
        assert!(matches!(err, LedgerError::NothingToClaim(_)));
    }

    #[test]
    fn paused_stream_blocks_withdrawal_but_keeps_accruing() {
        let mut account = created_account(10);
        let events = account
            .handle(&PayrollCommand::Pause { occurred_at: at(10) })
            .unwrap();
        apply_all(&mut account, events);

        let err = account
            .handle(&PayrollCommand::Withdraw { occurred_at: at(100) })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(account.withdrawable_at(at(100)), 0);
        // Accrual is unaffected by the pause.
        assert_eq!(account.earned_at(at(100)), 1_000);

        let events = account
            .handle(&PayrollCommand::Resume { occurred_at: at(100) })
            .unwrap();
        apply_all(&mut account, events);
        assert_eq!(account.withdrawable_at(at(100)), 1_000);
    }

    #[test]
    fn pause_and_resume_require_the_matching_state() {
        let mut account = created_account(10);
        assert!(matches!(
            account
                .handle(&PayrollCommand::Resume { occurred_at: at(1) })
                .unwrap_err(),
            LedgerError::Conflict(_)
        ));
        let events = account
            .handle(&PayrollCommand::Pause { occurred_at: at(1) })
            .unwrap();
        apply_all(&mut account, events);
        assert!(matches!(
            account
                .handle(&PayrollCommand::Pause { occurred_at: at(2) })
                .unwrap_err(),
            LedgerError::Conflict(_)
        ));
    }

    #[test]
    fn bonus_lifecycle_unlock_claim_never_twice() {
        let mut account = created_account(10);
        let unlock = at(SECONDS_PER_DAY as i64);
        let events = account
            .handle(&PayrollCommand::ScheduleBonus {
                amount: 50,
                unlocks_at: unlock,
                occurred_at: at(0),
            })
            .unwrap();
        apply_all(&mut account, events);

        assert_eq!(account.pending_bonus_total(at(unlock.timestamp() - 1)), 0);
        assert_eq!(account.pending_bonus_total(unlock), 50);

        // Withdrawal at unlock: base + bonus taxed together.
        let events = account
            .handle(&PayrollCommand::Withdraw { occurred_at: unlock })
            .unwrap();
        match &events[0] {
            PayrollEvent::Withdrawn(w) => {
                assert_eq!(w.gross_base, 10 * SECONDS_PER_DAY);
                assert_eq!(w.gross_total, w.gross_base + 50);
                assert_eq!(w.bonus_indices, vec![0]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        apply_all(&mut account, events);

        // The grant is history now and contributes nothing further.
        assert!(account.bonuses()[0].claimed);
        assert_eq!(account.pending_bonus_total(at(10 * SECONDS_PER_DAY as i64)), 0);
    }

    #[test]
    fn bonus_validation() {
        let account = created_account(10);
        assert!(matches!(
            account
                .handle(&PayrollCommand::ScheduleBonus {
                    amount: 0,
                    unlocks_at: at(100),
                    occurred_at: at(0),
                })
                .unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));
        assert!(matches!(
            account
                .handle(&PayrollCommand::ScheduleBonus {
                    amount: 10,
                    unlocks_at: at(0),
                    occurred_at: at(0),
                })
                .unwrap_err(),
            LedgerError::InvalidArgument(_)
        ));

        let empty = PayrollAccount::empty(IdentityId::new());
        assert!(matches!(
            empty
                .handle(&PayrollCommand::ScheduleBonus {
                    amount: 10,
                    unlocks_at: at(100),
                    occurred_at: at(0),
                })
                .unwrap_err(),
            LedgerError::NotFound(_)
        ));
    }

    #[test]
    fn cancel_releases_the_unvested_remainder() {
        let mut account = created_account(10);
        let halfway = at(5 * SECONDS_PER_MONTH as i64);
        let total = 10 * MONTHLY;

        let events = account
            .handle(&PayrollCommand::Cancel { occurred_at: halfway })
            .unwrap();
        match &events[0] {
            PayrollEvent::StreamCancelled(c) => {
                assert_eq!(c.earned, total / 2);
                assert_eq!(c.released, total / 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        apply_all(&mut account, events);

        assert!(!account.has_stream());
        assert_eq!(account.earned_at(halfway), 0);
        assert_eq!(account.withdrawable_at(halfway), 0);
    }

    #[test]
    fn bonuses_survive_cancellation_and_pay_out_untaxed() {
        let mut account = created_account(10);
        let unlock = at(SECONDS_PER_DAY as i64);
        let events = account
            .handle(&PayrollCommand::ScheduleBonus {
                amount: 80,
                unlocks_at: unlock,
                occurred_at: at(0),
            })
            .unwrap();
        apply_all(&mut account, events);

        // Withdraw the vested salary, then cancel before the unlock.
        let events = account
            .handle(&PayrollCommand::Withdraw { occurred_at: at(100) })
            .unwrap();
        apply_all(&mut account, events);
        let events = account
            .handle(&PayrollCommand::Cancel { occurred_at: at(200) })
            .unwrap();
        apply_all(&mut account, events);

        let events = account
            .handle(&PayrollCommand::Withdraw { occurred_at: unlock })
            .unwrap();
        match &events[0] {
            PayrollEvent::Withdrawn(w) => {
                assert_eq!(w.gross_base, 0);
                assert_eq!(w.gross_total, 80);
                assert_eq!(w.tax_amount, 0);
                assert_eq!(w.net_amount, 80);
                assert_eq!(w.bonus_indices, vec![0]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: `withdrawn_total <= earned(t) <= total_allocated` holds
        /// across any sequence of withdrawal times.
        #[test]
        fn withdrawn_bounded_by_earned_and_allocation(
            times in prop::collection::vec(1i64..40_000_000i64, 1..12)
        ) {
            let mut account = created_account(10);
            let mut sorted = times;
            sorted.sort_unstable();

            for t in sorted {
                let now = at(t);
                if let Ok(events) = account.handle(&PayrollCommand::Withdraw { occurred_at: now }) {
                    for e in &events {
                        account.apply(e);
                    }
                }
                let stream = account.stream().unwrap();
                prop_assert!(stream.withdrawn_total <= stream.earned_at(now));
                prop_assert!(stream.earned_at(now) <= stream.total_allocated);
            }
        }
    }
}
