use chrono::{DateTime, Utc};

/// A committed transition record.
///
/// Records are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable record name/type identifier (e.g. "custody.account.deposited").
    fn event_type(&self) -> &'static str;

    /// Schema version for this record type.
    fn version(&self) -> u32;

    /// When the transition occurred (ledger time, not wall-clock ingestion).
    fn occurred_at(&self) -> DateTime<Utc>;
}
