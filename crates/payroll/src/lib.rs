//! Stream Accounting and Bonus Vault.
//!
//! A stream vests salary per second from stored parameters; nothing ticks in
//! the background — earned amounts are recomputed from elapsed time at the
//! moment of each read or write. Bonuses are time-locked lump sums claimed
//! only as a side effect of withdrawal, so salary and bonuses always share
//! one tax computation and one atomic payout.

pub mod account;
pub mod bonus;
pub mod stream;

pub use account::{PayrollAccount, PayrollCommand, PayrollEvent, Withdrawn};
pub use bonus::BonusGrant;
pub use stream::StreamRecord;
