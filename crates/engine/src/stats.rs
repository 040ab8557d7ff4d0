use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use paystream_core::CompanyId;
use paystream_custody::CustodyEvent;
use paystream_events::{EventEnvelope, Projection};
use paystream_governance::GovernanceEvent;
use paystream_payroll::PayrollEvent;

use crate::record::LedgerRecord;

/// Ledger-wide counters and running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub companies_created: u64,
    pub streams_created: u64,
    pub active_streams: u64,
    pub deposited_total: u64,
    pub paid_gross_total: u64,
    pub tax_withheld_total: u64,
    pub bonuses_scheduled: u64,
    pub bonuses_paid: u64,
    pub yield_claimed_total: u64,
}

/// Per-company slice of the same counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub streams_created: u64,
    pub active_streams: u64,
    pub deposited_total: u64,
    pub paid_gross_total: u64,
    pub tax_withheld_total: u64,
    pub bonuses_scheduled: u64,
    pub bonuses_paid: u64,
    pub yield_claimed_total: u64,
}

/// Read model folding the journal into global and per-company stats.
///
/// Rebuildable from scratch by replaying the journal; `last_sequence` makes
/// redelivery of an already-applied envelope a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsProjection {
    last_sequence: u64,
    global: GlobalStats,
    companies: HashMap<CompanyId, CompanyStats>,
}

impl StatsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> GlobalStats {
        self.global
    }

    pub fn company(&self, company_id: CompanyId) -> CompanyStats {
        self.companies.get(&company_id).copied().unwrap_or_default()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn fold(&mut self, company_id: CompanyId, record: &LedgerRecord) {
        let company = self.companies.entry(company_id).or_default();

        match record {
            LedgerRecord::Custody(CustodyEvent::Deposited(e)) => {
                self.global.deposited_total += e.amount;
                company.deposited_total += e.amount;
            }
            LedgerRecord::Custody(CustodyEvent::YieldClaimed(e)) => {
                self.global.yield_claimed_total += e.amount;
                company.yield_claimed_total += e.amount;
            }
            LedgerRecord::Custody(_) => {}
            LedgerRecord::Payroll(PayrollEvent::StreamCreated(_)) => {
                self.global.streams_created += 1;
                self.global.active_streams += 1;
                company.streams_created += 1;
                company.active_streams += 1;
            }
            LedgerRecord::Payroll(PayrollEvent::Withdrawn(e)) => {
                self.global.paid_gross_total += e.gross_total;
                self.global.tax_withheld_total += e.tax_amount;
                self.global.bonuses_paid += e.bonus_indices.len() as u64;
                company.paid_gross_total += e.gross_total;
                company.tax_withheld_total += e.tax_amount;
                company.bonuses_paid += e.bonus_indices.len() as u64;
            }
            LedgerRecord::Payroll(PayrollEvent::StreamCancelled(_)) => {
                self.global.active_streams -= 1;
                company.active_streams -= 1;
            }
            LedgerRecord::Payroll(PayrollEvent::BonusScheduled(_)) => {
                self.global.bonuses_scheduled += 1;
                company.bonuses_scheduled += 1;
            }
            LedgerRecord::Payroll(_) => {}
            LedgerRecord::Governance(GovernanceEvent::CompanyCreated(_)) => {
                self.global.companies_created += 1;
            }
            LedgerRecord::Governance(_) => {}
        }
    }
}

impl Projection for StatsProjection {
    type Ev = LedgerRecord;

    fn apply(&mut self, envelope: &EventEnvelope<LedgerRecord>) {
        if envelope.sequence_number() <= self.last_sequence {
            return;
        }
        self.last_sequence = envelope.sequence_number();
        self.fold(envelope.company_id(), envelope.payload());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use paystream_core::{AccountKey, IdentityId};
    use paystream_custody::Deposited;
    use uuid::Uuid;

    fn deposit_envelope(sequence: u64, amount: u64) -> EventEnvelope<LedgerRecord> {
        let company = CompanyId::new(1);
        let key = AccountKey::new(IdentityId::new(), company);
        let record = LedgerRecord::Custody(CustodyEvent::Deposited(Deposited {
            key,
            amount,
            annual_yield_rate_percent: 5,
            occurred_at: Utc.timestamp_opt(0, 0).unwrap(),
        }));
        EventEnvelope::new(
            Uuid::now_v7(),
            company,
            record.aggregate_type(),
            record.aggregate_key(),
            sequence,
            record,
        )
    }

    #[test]
    fn folds_into_global_and_company_buckets() {
        let mut stats = StatsProjection::new();
        stats.apply(&deposit_envelope(1, 100));
        stats.apply(&deposit_envelope(2, 50));

        assert_eq!(stats.global().deposited_total, 150);
        assert_eq!(stats.company(CompanyId::new(1)).deposited_total, 150);
        assert_eq!(stats.company(CompanyId::new(2)).deposited_total, 0);
    }

    #[test]
    fn redelivered_envelope_is_a_no_op() {
        let mut stats = StatsProjection::new();
        let envelope = deposit_envelope(1, 100);
        stats.apply(&envelope);
        stats.apply(&envelope);

        assert_eq!(stats.global().deposited_total, 100);
        assert_eq!(stats.last_sequence(), 1);
    }
}
