//! The serialized writer that ties the ledger together.
//!
//! Every mutating call funnels through one `PayrollEngine` holding `&mut
//! self` for the whole operation: authorize, decide across the involved
//! aggregates (pure), settle external payouts, apply, journal, publish.
//! There is no background work anywhere — all state is advanced lazily from
//! elapsed time at the moment of a read or write.

pub mod engine;
pub mod record;
pub mod settlement;
pub mod stats;

pub use engine::{EngineConfig, EngineError, InMemoryEngine, PayrollEngine};
pub use record::LedgerRecord;
pub use settlement::{InMemorySettlement, Payee, SettlementError, SettlementGateway};
pub use stats::{CompanyStats, GlobalStats, StatsProjection};
