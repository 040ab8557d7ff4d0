use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paystream_core::CompanyId;

/// Envelope for a transition record: the unit appended to the audit journal.
///
/// - `sequence_number` is the **global commit order** — strictly increasing
///   across the whole ledger, not per aggregate. Elapsed-time calculations
///   are always evaluated against the clock of the commit that produced the
///   record, so replaying the journal in sequence order reproduces state.
/// - `company_id` scopes the record for per-company consumers (audit-log
///   store, stats projections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    record_id: Uuid,
    company_id: CompanyId,

    aggregate_type: String,
    aggregate_key: String,

    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        record_id: Uuid,
        company_id: CompanyId,
        aggregate_type: impl Into<String>,
        aggregate_key: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            record_id,
            company_id,
            aggregate_type: aggregate_type.into(),
            aggregate_key: aggregate_key.into(),
            sequence_number,
            payload,
        }
    }

    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_key(&self) -> &str {
        &self.aggregate_key
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
