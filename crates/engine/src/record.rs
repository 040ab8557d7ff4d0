use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paystream_core::CompanyId;
use paystream_custody::CustodyEvent;
use paystream_events::Event;
use paystream_governance::GovernanceEvent;
use paystream_payroll::PayrollEvent;

/// The journal's record type: every committed transition, from any of the
/// three bounded contexts, in global commit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRecord {
    Custody(CustodyEvent),
    Payroll(PayrollEvent),
    Governance(GovernanceEvent),
}

impl LedgerRecord {
    /// Company this record is scoped to (for per-company audit consumers).
    pub fn company_id(&self) -> CompanyId {
        match self {
            LedgerRecord::Custody(e) => e.key().company_id,
            LedgerRecord::Payroll(e) => e.company_id(),
            LedgerRecord::Governance(e) => e.company_id(),
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            LedgerRecord::Custody(_) => "custody.account",
            LedgerRecord::Payroll(_) => "payroll.account",
            LedgerRecord::Governance(_) => "governance.company",
        }
    }

    pub fn aggregate_key(&self) -> String {
        match self {
            LedgerRecord::Custody(e) => e.key().to_string(),
            LedgerRecord::Payroll(e) => e.employee().to_string(),
            LedgerRecord::Governance(e) => e.company_id().to_string(),
        }
    }
}

impl From<CustodyEvent> for LedgerRecord {
    fn from(value: CustodyEvent) -> Self {
        LedgerRecord::Custody(value)
    }
}

impl From<PayrollEvent> for LedgerRecord {
    fn from(value: PayrollEvent) -> Self {
        LedgerRecord::Payroll(value)
    }
}

impl From<GovernanceEvent> for LedgerRecord {
    fn from(value: GovernanceEvent) -> Self {
        LedgerRecord::Governance(value)
    }
}

impl Event for LedgerRecord {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerRecord::Custody(e) => e.event_type(),
            LedgerRecord::Payroll(e) => e.event_type(),
            LedgerRecord::Governance(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            LedgerRecord::Custody(e) => Event::version(e),
            LedgerRecord::Payroll(e) => Event::version(e),
            LedgerRecord::Governance(e) => Event::version(e),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerRecord::Custody(e) => e.occurred_at(),
            LedgerRecord::Payroll(e) => e.occurred_at(),
            LedgerRecord::Governance(e) => e.occurred_at(),
        }
    }
}
