//! Custody Ledger: per-(owner, company) treasury accounts.
//!
//! Capital is deposited, then earmarked (`reserved`) for streams and bonuses
//! before any payout can be promised. Yield accrues linearly on reserved
//! capital only, recomputed lazily from the last accrual timestamp.

pub mod account;

pub use account::{
    CustodyCommand, CustodyEvent, Deposited, FundsReleased, FundsReserved, ReservationReleased,
    TreasuryAccount, YieldClaimed, YieldStats,
};
