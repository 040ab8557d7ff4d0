use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paystream_core::units::{SECONDS_PER_YEAR, elapsed_seconds};
use paystream_core::{Aggregate, AggregateRoot, AccountKey, LedgerError};
use paystream_events::Event;

/// Aggregate root: a treasury account.
///
/// `deposited` is total-ever-deposited and never decreases; `reserved` is the
/// slice earmarked for active streams and scheduled bonuses. The account
/// invariant is `reserved <= deposited`, so `available()` can never underflow.
/// Accounts are created on first deposit and never deleted — a zero-activity
/// account persists as an audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryAccount {
    key: AccountKey,
    deposited: u64,
    reserved: u64,
    annual_yield_rate_percent: u64,
    last_accrual_at: Option<DateTime<Utc>>,
    yield_claimed_total: u64,
    version: u64,
    created: bool,
}

impl TreasuryAccount {
    /// Empty aggregate: the state before the first deposit.
    pub fn empty(key: AccountKey) -> Self {
        Self {
            key,
            deposited: 0,
            reserved: 0,
            annual_yield_rate_percent: 0,
            last_accrual_at: None,
            yield_claimed_total: 0,
            version: 0,
            created: false,
        }
    }

    pub fn key(&self) -> AccountKey {
        self.key
    }

    pub fn deposited(&self) -> u64 {
        self.deposited
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn available(&self) -> u64 {
        self.deposited - self.reserved
    }

    pub fn yield_claimed_total(&self) -> u64 {
        self.yield_claimed_total
    }

    pub fn annual_yield_rate_percent(&self) -> u64 {
        self.annual_yield_rate_percent
    }

    pub fn last_accrual_at(&self) -> Option<DateTime<Utc>> {
        self.last_accrual_at
    }

    /// Yield accrued on reserved capital since the last accrual point:
    /// `reserved × rate × Δt / (100 × SECONDS_PER_YEAR)`, truncating.
    ///
    /// Pure and repeatable: reading it twice without an intervening claim
    /// returns the same value for the same `now`.
    pub fn accrued_yield(&self, now: DateTime<Utc>) -> u64 {
        let Some(since) = self.last_accrual_at else {
            return 0;
        };
        let dt = elapsed_seconds(since, now);
        let numerator =
            self.reserved as u128 * self.annual_yield_rate_percent as u128 * dt as u128;
        (numerator / (100u128 * SECONDS_PER_YEAR as u128)) as u64
    }

    pub fn yield_stats(&self, now: DateTime<Utc>) -> YieldStats {
        YieldStats {
            accrued: self.accrued_yield(now),
            claimed_total: self.yield_claimed_total,
            annual_rate_percent: self.annual_yield_rate_percent,
            last_accrual_at: self.last_accrual_at,
        }
    }
}

/// Yield position of one account at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldStats {
    pub accrued: u64,
    pub claimed_total: u64,
    pub annual_rate_percent: u64,
    pub last_accrual_at: Option<DateTime<Utc>>,
}

impl AggregateRoot for TreasuryAccount {
    type Id = AccountKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyCommand {
    /// Increase deposited capital. First deposit creates the account and
    /// starts the yield clock at `occurred_at` with the given fixed rate.
    Deposit {
        amount: u64,
        annual_yield_rate_percent: u64,
        occurred_at: DateTime<Utc>,
    },
    /// Earmark available capital for a stream or bonus.
    Reserve {
        amount: u64,
        occurred_at: DateTime<Utc>,
    },
    /// Pay out reserved capital (irreversible external transfer).
    Release {
        amount: u64,
        occurred_at: DateTime<Utc>,
    },
    /// Return reserved capital to the available pool without a payout
    /// (stream cancellation).
    Unreserve {
        amount: u64,
        occurred_at: DateTime<Utc>,
    },
    /// Pay out all yield accrued since the last accrual point.
    ClaimYield { occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub key: AccountKey,
    pub amount: u64,
    pub annual_yield_rate_percent: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsReserved {
    pub key: AccountKey,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsReleased {
    pub key: AccountKey,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub key: AccountKey,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldClaimed {
    pub key: AccountKey,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyEvent {
    Deposited(Deposited),
    FundsReserved(FundsReserved),
    FundsReleased(FundsReleased),
    ReservationReleased(ReservationReleased),
    YieldClaimed(YieldClaimed),
}

impl CustodyEvent {
    /// Account the record belongs to.
    pub fn key(&self) -> AccountKey {
        match self {
            CustodyEvent::Deposited(e) => e.key,
            CustodyEvent::FundsReserved(e) => e.key,
            CustodyEvent::FundsReleased(e) => e.key,
            CustodyEvent::ReservationReleased(e) => e.key,
            CustodyEvent::YieldClaimed(e) => e.key,
        }
    }
}

impl Event for CustodyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustodyEvent::Deposited(_) => "custody.account.deposited",
            CustodyEvent::FundsReserved(_) => "custody.account.funds_reserved",
            CustodyEvent::FundsReleased(_) => "custody.account.funds_released",
            CustodyEvent::ReservationReleased(_) => "custody.account.reservation_released",
            CustodyEvent::YieldClaimed(_) => "custody.account.yield_claimed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustodyEvent::Deposited(e) => e.occurred_at,
            CustodyEvent::FundsReserved(e) => e.occurred_at,
            CustodyEvent::FundsReleased(e) => e.occurred_at,
            CustodyEvent::ReservationReleased(e) => e.occurred_at,
            CustodyEvent::YieldClaimed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TreasuryAccount {
    type Command = CustodyCommand;
    type Event = CustodyEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustodyEvent::Deposited(e) => {
                self.deposited += e.amount;
                if !self.created {
                    self.created = true;
                    self.annual_yield_rate_percent = e.annual_yield_rate_percent;
                    self.last_accrual_at = Some(e.occurred_at);
                }
            }
            CustodyEvent::FundsReserved(e) => {
                self.reserved += e.amount;
            }
            CustodyEvent::FundsReleased(e) => {
                self.reserved -= e.amount;
            }
            CustodyEvent::ReservationReleased(e) => {
                self.reserved -= e.amount;
            }
            CustodyEvent::YieldClaimed(e) => {
                self.yield_claimed_total += e.amount;
                self.last_accrual_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustodyCommand::Deposit {
                amount,
                annual_yield_rate_percent,
                occurred_at,
            } => {
                if *amount == 0 {
                    return Err(LedgerError::invalid_argument("deposit amount must be positive"));
                }
                if self.deposited.checked_add(*amount).is_none() {
                    return Err(LedgerError::invalid_argument("deposit overflows account"));
                }
                Ok(vec![CustodyEvent::Deposited(Deposited {
                    key: self.key,
                    amount: *amount,
                    annual_yield_rate_percent: *annual_yield_rate_percent,
                    occurred_at: *occurred_at,
                })])
            }
            CustodyCommand::Reserve { amount, occurred_at } => {
                if *amount == 0 {
                    return Err(LedgerError::invalid_argument("reserve amount must be positive"));
                }
                if self.available() < *amount {
                    return Err(LedgerError::insufficient_funds(*amount, self.available()));
                }
                Ok(vec![CustodyEvent::FundsReserved(FundsReserved {
                    key: self.key,
                    amount: *amount,
                    occurred_at: *occurred_at,
                })])
            }
            CustodyCommand::Release { amount, occurred_at } => {
                if self.reserved < *amount {
                    return Err(LedgerError::insufficient_funds(*amount, self.reserved));
                }
                Ok(vec![CustodyEvent::FundsReleased(FundsReleased {
                    key: self.key,
                    amount: *amount,
                    occurred_at: *occurred_at,
                })])
            }
            CustodyCommand::Unreserve { amount, occurred_at } => {
                if self.reserved < *amount {
                    return Err(LedgerError::insufficient_funds(*amount, self.reserved));
                }
                Ok(vec![CustodyEvent::ReservationReleased(ReservationReleased {
                    key: self.key,
                    amount: *amount,
                    occurred_at: *occurred_at,
                })])
            }
            CustodyCommand::ClaimYield { occurred_at } => {
                let accrued = self.accrued_yield(*occurred_at);
                if accrued == 0 {
                    return Err(LedgerError::nothing_to_claim("no yield accrued"));
                }
                Ok(vec![CustodyEvent::YieldClaimed(YieldClaimed {
                    key: self.key,
                    amount: accrued,
                    occurred_at: *occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paystream_core::units::SECONDS_PER_YEAR;
    use paystream_core::{CompanyId, IdentityId};
    use proptest::prelude::*;

    fn test_key() -> AccountKey {
        AccountKey::new(IdentityId::new(), CompanyId::new(1))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn apply_all(account: &mut TreasuryAccount, events: Vec<CustodyEvent>) {
        for e in &events {
            account.apply(e);
        }
    }

    fn deposit(account: &mut TreasuryAccount, amount: u64, now: DateTime<Utc>) {
        let events = account
            .handle(&CustodyCommand::Deposit {
                amount,
                annual_yield_rate_percent: 5,
                occurred_at: now,
            })
            .unwrap();
        apply_all(account, events);
    }

    #[test]
    fn first_deposit_creates_account_and_starts_yield_clock() {
        let mut account = TreasuryAccount::empty(test_key());
        deposit(&mut account, 1_000, at(100));

        assert_eq!(account.deposited(), 1_000);
        assert_eq!(account.available(), 1_000);
        assert_eq!(account.last_accrual_at(), Some(at(100)));
        assert_eq!(account.annual_yield_rate_percent(), 5);
    }

    #[test]
    fn zero_deposit_is_rejected() {
        let account = TreasuryAccount::empty(test_key());
        let err = account
            .handle(&CustodyCommand::Deposit {
                amount: 0,
                annual_yield_rate_percent: 5,
                occurred_at: at(0),
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn reserve_respects_available_capital() {
        let mut account = TreasuryAccount::empty(test_key());
        deposit(&mut account, 500, at(0));

        let events = account
            .handle(&CustodyCommand::Reserve { amount: 300, occurred_at: at(1) })
            .unwrap();
        apply_all(&mut account, events);
        assert_eq!(account.reserved(), 300);
        assert_eq!(account.available(), 200);

        let err = account
            .handle(&CustodyCommand::Reserve { amount: 201, occurred_at: at(2) })
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds { requested: 201, available: 200 }
        );
        // Rejection left nothing behind.
        assert_eq!(account.reserved(), 300);
    }

    #[test]
    fn release_never_exceeds_reserved() {
        let mut account = TreasuryAccount::empty(test_key());
        deposit(&mut account, 500, at(0));
        let events = account
            .handle(&CustodyCommand::Reserve { amount: 100, occurred_at: at(1) })
            .unwrap();
        apply_all(&mut account, events);

        let err = account
            .handle(&CustodyCommand::Release { amount: 101, occurred_at: at(2) })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let events = account
            .handle(&CustodyCommand::Release { amount: 100, occurred_at: at(2) })
            .unwrap();
        apply_all(&mut account, events);
        assert_eq!(account.reserved(), 0);
        // Deposited is total-ever-deposited; payouts do not shrink it.
        assert_eq!(account.deposited(), 500);
    }

    #[test]
    fn yield_accrues_only_on_reserved_capital() {
        let mut account = TreasuryAccount::empty(test_key());
        deposit(&mut account, 10_000, at(0));

        // Nothing reserved: a full year accrues nothing.
        assert_eq!(account.accrued_yield(at(SECONDS_PER_YEAR as i64)), 0);

        let events = account
            .handle(&CustodyCommand::Reserve { amount: 1_000, occurred_at: at(0) })
            .unwrap();
        apply_all(&mut account, events);

        // 1000 reserved at 5% for one year (yield clock started at deposit).
        assert_eq!(account.accrued_yield(at(SECONDS_PER_YEAR as i64)), 50);
        // Half a year truncates down.
        assert_eq!(account.accrued_yield(at(SECONDS_PER_YEAR as i64 / 2)), 25);
    }

    #[test]
    fn claim_yield_resets_the_accrual_point() {
        let mut account = TreasuryAccount::empty(test_key());
        deposit(&mut account, 10_000, at(0));
        let events = account
            .handle(&CustodyCommand::Reserve { amount: 1_000, occurred_at: at(0) })
            .unwrap();
        apply_all(&mut account, events);

        let year = at(SECONDS_PER_YEAR as i64);
        let events = account
            .handle(&CustodyCommand::ClaimYield { occurred_at: year })
            .unwrap();
        match &events[0] {
            CustodyEvent::YieldClaimed(e) => assert_eq!(e.amount, 50),
            other => panic!("unexpected event: {other:?}"),
        }
        apply_all(&mut account, events);

        assert_eq!(account.yield_claimed_total(), 50);
        assert_eq!(account.accrued_yield(year), 0);

        let err = account
            .handle(&CustodyCommand::ClaimYield { occurred_at: year })
            .unwrap_err();
        assert!(matches!(err, LedgerError::NothingToClaim(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: `reserved <= deposited` after any accepted sequence of
        /// deposit/reserve/release/unreserve operations, regardless of order.
        #[test]
        fn reserved_never_exceeds_deposited(
            ops in prop::collection::vec((0u8..4, 1u64..10_000u64), 1..60)
        ) {
            let mut account = TreasuryAccount::empty(test_key());
            let mut t = 0i64;

            for (kind, amount) in ops {
                t += 1;
                let command = match kind {
                    0 => CustodyCommand::Deposit {
                        amount,
                        annual_yield_rate_percent: 5,
                        occurred_at: at(t),
                    },
                    1 => CustodyCommand::Reserve { amount, occurred_at: at(t) },
                    2 => CustodyCommand::Release { amount, occurred_at: at(t) },
                    _ => CustodyCommand::Unreserve { amount, occurred_at: at(t) },
                };

                if let Ok(events) = account.handle(&command) {
                    for e in &events {
                        account.apply(e);
                    }
                }

                prop_assert!(account.reserved() <= account.deposited());
            }
        }
    }
}
