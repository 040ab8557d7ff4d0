//! `paystream-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the ledger error taxonomy, time units, the
//! aggregate traits, and the dense membership roster.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod roster;
pub mod units;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountKey, CompanyId, IdentityId};
pub use roster::Roster;
