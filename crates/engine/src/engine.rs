use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use paystream_core::{
    Aggregate, AccountKey, CompanyId, IdentityId, LedgerError, LedgerResult, Roster,
};
use paystream_custody::{CustodyCommand, CustodyEvent, TreasuryAccount, YieldStats};
use paystream_events::{
    Event, EventBus, EventEnvelope, InMemoryEventBus, Projection, Subscription,
};
use paystream_governance::{
    Company, GovernanceCommand, Role, require_ceo, require_manager,
};
use paystream_payroll::{
    BonusGrant, PayrollAccount, PayrollCommand, PayrollEvent, StreamRecord,
};

use crate::record::LedgerRecord;
use crate::settlement::{InMemorySettlement, Payee, SettlementGateway};
use crate::stats::{CompanyStats, GlobalStats, StatsProjection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed at account creation for every treasury account opened under
    /// this engine.
    pub annual_yield_rate_percent: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            annual_yield_rate_percent: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] LedgerError),
    /// The external transfer was rejected; no ledger state was touched.
    #[error("settlement failed: {0}")]
    Settlement(String),
    /// The record was journaled but fan-out failed; subscribers can catch up
    /// from the journal (at-least-once delivery).
    #[error("publish failed after commit: {0}")]
    Publish(String),
}

/// The single serialized writer over the whole ledger.
///
/// Every mutating call holds `&mut self` end to end: authorize, decide on
/// each involved aggregate (pure), settle external payouts, apply, journal,
/// publish, fold stats. Any error before `apply` leaves no trace. Reads never
/// mutate; all elapsed-time math is recomputed from stored parameters at the
/// moment of the call.
#[derive(Debug)]
pub struct PayrollEngine<S, B> {
    config: EngineConfig,
    /// Clamped to `max(clock, now)` on every mutating call so elapsed-time
    /// math always sees a non-decreasing clock in commit order.
    clock: DateTime<Utc>,
    next_company_id: u64,
    companies: BTreeMap<CompanyId, Company>,
    accounts: HashMap<AccountKey, TreasuryAccount>,
    payroll: HashMap<IdentityId, PayrollAccount>,
    active_streams: HashMap<CompanyId, Roster>,
    stats: StatsProjection,
    journal: Vec<EventEnvelope<LedgerRecord>>,
    sequence: u64,
    settlement: S,
    bus: B,
}

pub type InMemoryEngine =
    PayrollEngine<InMemorySettlement, InMemoryEventBus<EventEnvelope<LedgerRecord>>>;

impl InMemoryEngine {
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(config, InMemorySettlement::new(), InMemoryEventBus::new())
    }
}

impl<S, B> PayrollEngine<S, B>
where
    S: SettlementGateway,
    B: EventBus<EventEnvelope<LedgerRecord>>,
{
    pub fn new(config: EngineConfig, settlement: S, bus: B) -> Self {
        Self {
            config,
            clock: DateTime::<Utc>::MIN_UTC,
            next_company_id: 1,
            companies: BTreeMap::new(),
            accounts: HashMap::new(),
            payroll: HashMap::new(),
            active_streams: HashMap::new(),
            stats: StatsProjection::new(),
            journal: Vec::new(),
            sequence: 0,
            settlement,
            bus,
        }
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    /// Register a company; the caller becomes its sole CEO and the identity
    /// whose treasury account backs its payroll.
    pub fn create_company(
        &mut self,
        caller: IdentityId,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<CompanyId, EngineError> {
        let now = self.tick(now);
        let id = CompanyId::new(self.next_company_id);
        let mut company = Company::empty(id);
        let events = company.handle(&GovernanceCommand::Create {
            owner: caller,
            name: name.into(),
            occurred_at: now,
        })?;
        for e in &events {
            company.apply(e);
        }
        self.next_company_id += 1;
        self.companies.insert(id, company);
        self.commit(events.into_iter().map(Into::into).collect())?;
        Ok(id)
    }

    /// CEO only.
    pub fn update_company_name(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_ceo(self.company(company_id)?, caller)?;
        self.govern(company_id, GovernanceCommand::Rename {
            name: name.into(),
            occurred_at: now,
        })
    }

    /// CEO only; target must currently hold no role in this company.
    pub fn add_ceo(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        target: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_ceo(self.company(company_id)?, caller)?;
        self.govern(company_id, GovernanceCommand::AddCeo { target, occurred_at: now })
    }

    /// CEO only; refuses to remove the last CEO.
    pub fn remove_ceo(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        target: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_ceo(self.company(company_id)?, caller)?;
        self.govern(company_id, GovernanceCommand::RemoveCeo { target, occurred_at: now })
    }

    /// CEO only.
    pub fn add_hr(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        target: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_ceo(self.company(company_id)?, caller)?;
        self.govern(company_id, GovernanceCommand::AddHr { target, occurred_at: now })
    }

    /// CEO only.
    pub fn remove_hr(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        target: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_ceo(self.company(company_id)?, caller)?;
        self.govern(company_id, GovernanceCommand::RemoveHr { target, occurred_at: now })
    }

    /// HR or CEO.
    pub fn add_employee(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        target: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_manager(self.company(company_id)?, caller)?;
        self.govern(company_id, GovernanceCommand::AddEmployee { target, occurred_at: now })
    }

    /// HR or CEO. Rejected while the target has a live stream in this
    /// company; the stream must be cancelled first.
    pub fn remove_employee(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        target: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        require_manager(self.company(company_id)?, caller)?;
        if let Some(stream) = self.payroll.get(&target).and_then(|a| a.stream()) {
            if stream.company_id == company_id {
                return Err(LedgerError::conflict("employee has an active stream").into());
            }
        }
        self.govern(company_id, GovernanceCommand::RemoveEmployee { target, occurred_at: now })
    }

    // ------------------------------------------------------------------
    // Custody
    // ------------------------------------------------------------------

    /// Fund the caller's treasury account for `company_id`. The first
    /// deposit creates the account and starts its yield clock at the
    /// engine-configured rate.
    pub fn deposit(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        self.company(company_id)?;
        let key = AccountKey::new(caller, company_id);
        let events = self.treasury_state(key).handle(&CustodyCommand::Deposit {
            amount,
            annual_yield_rate_percent: self.config.annual_yield_rate_percent,
            occurred_at: now,
        })?;
        let treasury = self
            .accounts
            .entry(key)
            .or_insert_with(|| TreasuryAccount::empty(key));
        for e in &events {
            treasury.apply(e);
        }
        self.commit(events.into_iter().map(Into::into).collect())
    }

    /// Pay out all yield accrued on the caller's reserved capital since the
    /// last accrual point. Returns the claimed amount.
    pub fn claim_yield(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        let now = self.tick(now);
        let key = AccountKey::new(caller, company_id);
        let treasury = self
            .accounts
            .get(&key)
            .ok_or_else(|| LedgerError::not_found("treasury account does not exist"))?;
        let events = treasury.handle(&CustodyCommand::ClaimYield { occurred_at: now })?;
        let amount = match events.as_slice() {
            [CustodyEvent::YieldClaimed(e)] => e.amount,
            _ => return Err(LedgerError::nothing_to_claim("no yield accrued").into()),
        };

        self.transfer(Payee::Identity(caller), amount)?;

        if let Some(treasury) = self.accounts.get_mut(&key) {
            for e in &events {
                treasury.apply(e);
            }
        }
        self.commit(events.into_iter().map(Into::into).collect())?;
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Streams and bonuses
    // ------------------------------------------------------------------

    /// Open a salary stream for a registered employee, reserving the full
    /// allocation from the company owner's treasury in the same commit.
    /// HR or CEO.
    #[allow(clippy::too_many_arguments)]
    pub fn create_stream(
        &mut self,
        caller: IdentityId,
        company_id: CompanyId,
        employee: IdentityId,
        monthly_amount: u64,
        duration_months: u64,
        tax_percent: u8,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        let company = self.company(company_id)?;
        require_manager(company, caller)?;
        if !company.is_registered_employee(employee) {
            return Err(LedgerError::not_found("identity is not a registered employee").into());
        }
        let owner = company.owner();
        let funding = AccountKey::new(owner, company_id);

        let payroll_events = self
            .payroll_state(employee)
            .handle(&PayrollCommand::CreateStream {
                owner,
                company_id,
                monthly_amount,
                duration_months,
                tax_percent,
                occurred_at: now,
            })?;
        let total_allocated = match payroll_events.as_slice() {
            [PayrollEvent::StreamCreated(e)] => e.total_allocated,
            _ => {
                return Err(
                    LedgerError::invalid_argument("stream creation yielded no record").into(),
                );
            }
        };

        let custody_events = self
            .treasury_state(funding)
            .handle(&CustodyCommand::Reserve {
                amount: total_allocated,
                occurred_at: now,
            })?;

        let treasury = self
            .accounts
            .entry(funding)
            .or_insert_with(|| TreasuryAccount::empty(funding));
        for e in &custody_events {
            treasury.apply(e);
        }
        let account = self
            .payroll
            .entry(employee)
            .or_insert_with(|| PayrollAccount::empty(employee));
        for e in &payroll_events {
            account.apply(e);
        }
        self.active_streams
            .entry(company_id)
            .or_insert_with(Roster::new)
            .insert(employee);

        let mut records: Vec<LedgerRecord> =
            custody_events.into_iter().map(Into::into).collect();
        records.extend(payroll_events.into_iter().map(Into::into));
        self.commit(records)
    }

    /// Pay out everything currently due to the caller: vested salary plus
    /// every unlocked unclaimed bonus, split into net and tax. Returns the
    /// net amount transferred.
    pub fn withdraw(
        &mut self,
        caller: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        let now = self.tick(now);
        let account = self
            .payroll
            .get(&caller)
            .ok_or_else(|| LedgerError::not_found("no active stream for employee"))?;
        let payroll_events = account.handle(&PayrollCommand::Withdraw { occurred_at: now })?;
        let withdrawn = match payroll_events.as_slice() {
            [PayrollEvent::Withdrawn(w)] => w.clone(),
            _ => return Err(LedgerError::nothing_to_claim("nothing withdrawable").into()),
        };

        // One release per funding account, merged so each account's state is
        // decided exactly once.
        let mut releases: Vec<(AccountKey, u64)> = Vec::new();
        if withdrawn.gross_base > 0 {
            let stream = account
                .stream()
                .ok_or_else(|| LedgerError::not_found("no active stream for employee"))?;
            merge_release(
                &mut releases,
                AccountKey::new(stream.owner, stream.company_id),
                withdrawn.gross_base,
            );
        }
        for idx in &withdrawn.bonus_indices {
            let grant = account.bonuses()[*idx as usize];
            merge_release(
                &mut releases,
                AccountKey::new(grant.owner, grant.company_id),
                grant.amount,
            );
        }

        let mut custody_events: Vec<CustodyEvent> = Vec::new();
        for (key, amount) in &releases {
            let treasury = self
                .accounts
                .get(key)
                .ok_or_else(|| LedgerError::insufficient_funds(*amount, 0))?;
            custody_events.extend(treasury.handle(&CustodyCommand::Release {
                amount: *amount,
                occurred_at: now,
            })?);
        }

        // External payouts happen before any state is applied; a rejection
        // aborts with the ledger untouched.
        if withdrawn.net_amount > 0 {
            self.transfer(Payee::Identity(caller), withdrawn.net_amount)?;
        }
        if withdrawn.tax_amount > 0 {
            self.transfer(Payee::TaxVault(withdrawn.company_id), withdrawn.tax_amount)?;
        }

        for e in &custody_events {
            if let Some(treasury) = self.accounts.get_mut(&e.key()) {
                treasury.apply(e);
            }
        }
        if let Some(account) = self.payroll.get_mut(&caller) {
            for e in &payroll_events {
                account.apply(e);
            }
        }

        let mut records: Vec<LedgerRecord> =
            custody_events.into_iter().map(Into::into).collect();
        records.extend(payroll_events.into_iter().map(Into::into));
        self.commit(records)?;
        Ok(withdrawn.net_amount)
    }

    /// Freeze payout without stopping accrual. HR or CEO of the stream's
    /// company.
    pub fn pause_stream(
        &mut self,
        caller: IdentityId,
        employee: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        let stream = self.stream_of(employee)?;
        require_manager(self.company(stream.company_id)?, caller)?;
        let events = self
            .payroll_state(employee)
            .handle(&PayrollCommand::Pause { occurred_at: now })?;
        if let Some(account) = self.payroll.get_mut(&employee) {
            for e in &events {
                account.apply(e);
            }
        }
        self.commit(events.into_iter().map(Into::into).collect())
    }

    /// HR or CEO of the stream's company.
    pub fn resume_stream(
        &mut self,
        caller: IdentityId,
        employee: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        let stream = self.stream_of(employee)?;
        require_manager(self.company(stream.company_id)?, caller)?;
        let events = self
            .payroll_state(employee)
            .handle(&PayrollCommand::Resume { occurred_at: now })?;
        if let Some(account) = self.payroll.get_mut(&employee) {
            for e in &events {
                account.apply(e);
            }
        }
        self.commit(events.into_iter().map(Into::into).collect())
    }

    /// Destroy the stream, returning the unvested remainder
    /// (`total_allocated - earned(now)`) to the employer's available
    /// capital. Bonuses are untouched. HR or CEO of the stream's company.
    pub fn cancel_stream(
        &mut self,
        caller: IdentityId,
        employee: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        let stream = self.stream_of(employee)?;
        require_manager(self.company(stream.company_id)?, caller)?;
        let funding = AccountKey::new(stream.owner, stream.company_id);

        let payroll_events = self
            .payroll_state(employee)
            .handle(&PayrollCommand::Cancel { occurred_at: now })?;
        let released = match payroll_events.as_slice() {
            [PayrollEvent::StreamCancelled(c)] => c.released,
            _ => return Err(LedgerError::not_found("no active stream for employee").into()),
        };

        let mut custody_events: Vec<CustodyEvent> = Vec::new();
        if released > 0 {
            let treasury = self
                .accounts
                .get(&funding)
                .ok_or_else(|| LedgerError::insufficient_funds(released, 0))?;
            custody_events = treasury.handle(&CustodyCommand::Unreserve {
                amount: released,
                occurred_at: now,
            })?;
        }

        if let Some(treasury) = self.accounts.get_mut(&funding) {
            for e in &custody_events {
                treasury.apply(e);
            }
        }
        if let Some(account) = self.payroll.get_mut(&employee) {
            for e in &payroll_events {
                account.apply(e);
            }
        }
        if let Some(roster) = self.active_streams.get_mut(&stream.company_id) {
            roster.remove(employee);
        }

        let mut records: Vec<LedgerRecord> =
            custody_events.into_iter().map(Into::into).collect();
        records.extend(payroll_events.into_iter().map(Into::into));
        self.commit(records)
    }

    /// Grant a time-locked lump sum, reserving it immediately from the
    /// stream's funding account. HR or CEO of the stream's company.
    pub fn schedule_bonus(
        &mut self,
        caller: IdentityId,
        employee: IdentityId,
        amount: u64,
        unlocks_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let now = self.tick(now);
        let stream = self.stream_of(employee)?;
        require_manager(self.company(stream.company_id)?, caller)?;
        let funding = AccountKey::new(stream.owner, stream.company_id);

        let payroll_events = self
            .payroll_state(employee)
            .handle(&PayrollCommand::ScheduleBonus {
                amount,
                unlocks_at,
                occurred_at: now,
            })?;
        let custody_events = self
            .treasury_state(funding)
            .handle(&CustodyCommand::Reserve { amount, occurred_at: now })?;

        if let Some(treasury) = self.accounts.get_mut(&funding) {
            for e in &custody_events {
                treasury.apply(e);
            }
        }
        if let Some(account) = self.payroll.get_mut(&employee) {
            for e in &payroll_events {
                account.apply(e);
            }
        }

        let mut records: Vec<LedgerRecord> =
            custody_events.into_iter().map(Into::into).collect();
        records.extend(payroll_events.into_iter().map(Into::into));
        self.commit(records)
    }

    // ------------------------------------------------------------------
    // Reads (pure; never mutate, not even the clock)
    // ------------------------------------------------------------------

    /// Amount vested up to `now`; zero without a live stream.
    pub fn get_earned(&self, employee: IdentityId, now: DateTime<Utc>) -> u64 {
        let now = self.observe(now);
        self.payroll.get(&employee).map_or(0, |a| a.earned_at(now))
    }

    /// Earned minus withdrawn; zero while paused or without a live stream.
    pub fn get_withdrawable(&self, employee: IdentityId, now: DateTime<Utc>) -> u64 {
        let now = self.observe(now);
        self.payroll
            .get(&employee)
            .map_or(0, |a| a.withdrawable_at(now))
    }

    pub fn has_stream(&self, employee: IdentityId) -> bool {
        self.payroll.get(&employee).is_some_and(|a| a.has_stream())
    }

    pub fn get_stream_details(&self, employee: IdentityId) -> LedgerResult<StreamRecord> {
        self.payroll
            .get(&employee)
            .and_then(|a| a.stream())
            .copied()
            .ok_or_else(|| LedgerError::not_found("no active stream for employee"))
    }

    /// Sum of all unclaimed grants whose unlock time has passed.
    pub fn get_pending_bonus_total(&self, employee: IdentityId, now: DateTime<Utc>) -> u64 {
        let now = self.observe(now);
        self.payroll
            .get(&employee)
            .map_or(0, |a| a.pending_bonus_total(now))
    }

    /// Full grant history, claimed grants included.
    pub fn get_employee_bonuses(&self, employee: IdentityId) -> Vec<BonusGrant> {
        self.payroll
            .get(&employee)
            .map_or_else(Vec::new, |a| a.bonuses().to_vec())
    }

    pub fn get_accrued_yield(
        &self,
        owner: IdentityId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> u64 {
        let now = self.observe(now);
        self.accounts
            .get(&AccountKey::new(owner, company_id))
            .map_or(0, |a| a.accrued_yield(now))
    }

    pub fn get_yield_stats(
        &self,
        owner: IdentityId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> LedgerResult<YieldStats> {
        let now = self.observe(now);
        self.accounts
            .get(&AccountKey::new(owner, company_id))
            .map(|a| a.yield_stats(now))
            .ok_or_else(|| LedgerError::not_found("treasury account does not exist"))
    }

    pub fn get_company_stats(&self, company_id: CompanyId) -> CompanyStats {
        self.stats.company(company_id)
    }

    pub fn get_global_stats(&self) -> GlobalStats {
        self.stats.global()
    }

    pub fn get_company_roles(
        &self,
        company_id: CompanyId,
    ) -> LedgerResult<Vec<(IdentityId, Role)>> {
        Ok(self.company(company_id)?.roles_snapshot())
    }

    pub fn list_employees(&self, company_id: CompanyId) -> LedgerResult<Vec<IdentityId>> {
        Ok(self.company(company_id)?.employees().to_vec())
    }

    /// Employees of `company_id` with a live stream, in roster order.
    pub fn list_active_streams(&self, company_id: CompanyId) -> Vec<IdentityId> {
        self.active_streams
            .get(&company_id)
            .map_or_else(Vec::new, |r| r.as_slice().to_vec())
    }

    pub fn list_companies(&self) -> Vec<CompanyId> {
        self.companies.keys().copied().collect()
    }

    pub fn treasury_account(&self, key: AccountKey) -> Option<&TreasuryAccount> {
        self.accounts.get(&key)
    }

    /// The full audit journal in commit order.
    pub fn journal(&self) -> &[EventEnvelope<LedgerRecord>] {
        &self.journal
    }

    pub fn subscribe(&self) -> Subscription<EventEnvelope<LedgerRecord>> {
        self.bus.subscribe()
    }

    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn tick(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.clock = self.clock.max(now);
        self.clock
    }

    fn observe(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.clock.max(now)
    }

    fn company(&self, company_id: CompanyId) -> LedgerResult<&Company> {
        self.companies
            .get(&company_id)
            .ok_or_else(|| LedgerError::not_found("company does not exist"))
    }

    fn stream_of(&self, employee: IdentityId) -> LedgerResult<StreamRecord> {
        self.payroll
            .get(&employee)
            .and_then(|a| a.stream())
            .copied()
            .ok_or_else(|| LedgerError::not_found("no active stream for employee"))
    }

    /// Snapshot for deciding; `empty` stands in for an account that does not
    /// exist yet so a rejected command never inserts one.
    fn treasury_state(&self, key: AccountKey) -> TreasuryAccount {
        self.accounts
            .get(&key)
            .cloned()
            .unwrap_or_else(|| TreasuryAccount::empty(key))
    }

    fn payroll_state(&self, employee: IdentityId) -> PayrollAccount {
        self.payroll
            .get(&employee)
            .cloned()
            .unwrap_or_else(|| PayrollAccount::empty(employee))
    }

    fn transfer(&mut self, payee: Payee, amount: u64) -> Result<(), EngineError> {
        self.settlement.transfer(payee, amount).map_err(|e| {
            tracing::warn!(amount, "settlement rejected, aborting");
            EngineError::Settlement(e.to_string())
        })
    }

    fn govern(
        &mut self,
        company_id: CompanyId,
        command: GovernanceCommand,
    ) -> Result<(), EngineError> {
        let company = self
            .companies
            .get_mut(&company_id)
            .ok_or_else(|| LedgerError::not_found("company does not exist"))?;
        let events = company.handle(&command)?;
        for e in &events {
            company.apply(e);
        }
        self.commit(events.into_iter().map(Into::into).collect())
    }

    /// Append decided records to the journal with the next global sequence
    /// numbers, fold them into the stats read model, and fan out.
    fn commit(&mut self, records: Vec<LedgerRecord>) -> Result<(), EngineError> {
        for record in records {
            self.sequence += 1;
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                record.company_id(),
                record.aggregate_type(),
                record.aggregate_key(),
                self.sequence,
                record,
            );
            tracing::info!(
                sequence = envelope.sequence_number(),
                event = envelope.payload().event_type(),
                company = %envelope.company_id(),
                "committed"
            );
            self.stats.apply(&envelope);
            // Journal first: a subscriber must never see a record the
            // journal does not yet contain.
            self.journal.push(envelope.clone());
            if let Err(e) = self.bus.publish(envelope) {
                return Err(EngineError::Publish(format!("{e:?}")));
            }
        }
        Ok(())
    }
}

fn merge_release(releases: &mut Vec<(AccountKey, u64)>, key: AccountKey, amount: u64) {
    if let Some(entry) = releases.iter_mut().find(|(k, _)| *k == key) {
        entry.1 += amount;
    } else {
        releases.push((key, amount));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn company_ids_come_from_a_monotonic_counter() {
        let mut engine = InMemoryEngine::in_memory(EngineConfig::default());
        let a = engine.create_company(IdentityId::new(), "A", at(0)).unwrap();
        let b = engine.create_company(IdentityId::new(), "B", at(1)).unwrap();
        assert_eq!(a, CompanyId::new(1));
        assert_eq!(b, CompanyId::new(2));
        assert_eq!(engine.list_companies(), vec![a, b]);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut engine = InMemoryEngine::in_memory(EngineConfig::default());
        engine.create_company(IdentityId::new(), "A", at(100)).unwrap();
        assert_eq!(engine.clock(), at(100));

        // A call with an earlier timestamp is evaluated at the clamped clock.
        engine.create_company(IdentityId::new(), "B", at(50)).unwrap();
        assert_eq!(engine.clock(), at(100));
    }

    #[test]
    fn governance_requires_the_exact_tier() {
        let mut engine = InMemoryEngine::in_memory(EngineConfig::default());
        let ceo = IdentityId::new();
        let company = engine.create_company(ceo, "Acme", at(0)).unwrap();
        let hr = IdentityId::new();
        engine.add_hr(ceo, company, hr, at(1)).unwrap();

        // HR cannot grant roles.
        let err = engine
            .add_ceo(hr, company, IdentityId::new(), at(2))
            .unwrap_err();
        assert_eq!(err, EngineError::Domain(LedgerError::Unauthorized));

        // HR can manage the roster.
        engine.add_employee(hr, company, IdentityId::new(), at(3)).unwrap();
    }

    #[test]
    fn deposit_requires_an_existing_company() {
        let mut engine = InMemoryEngine::in_memory(EngineConfig::default());
        let err = engine
            .deposit(IdentityId::new(), CompanyId::new(9), 100, at(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(LedgerError::NotFound(_))));
    }

    #[test]
    fn renaming_and_hr_removal_are_ceo_only() {
        let mut engine = InMemoryEngine::in_memory(EngineConfig::default());
        let ceo = IdentityId::new();
        let company = engine.create_company(ceo, "Acme", at(0)).unwrap();
        let hr = IdentityId::new();
        engine.add_hr(ceo, company, hr, at(1)).unwrap();

        let err = engine
            .update_company_name(hr, company, "Acme Global", at(2))
            .unwrap_err();
        assert_eq!(err, EngineError::Domain(LedgerError::Unauthorized));
        let err = engine.remove_hr(hr, company, hr, at(2)).unwrap_err();
        assert_eq!(err, EngineError::Domain(LedgerError::Unauthorized));

        engine
            .update_company_name(ceo, company, "Acme Global", at(3))
            .unwrap();
        assert!(
            engine
                .journal()
                .iter()
                .any(|e| e.payload().event_type() == "governance.company.renamed")
        );

        engine.remove_hr(ceo, company, hr, at(4)).unwrap();
        assert_eq!(
            engine.get_company_roles(company).unwrap(),
            vec![(ceo, Role::Ceo)]
        );
    }

    struct FailingBus;

    impl EventBus<EventEnvelope<LedgerRecord>> for FailingBus {
        type Error = String;

        fn publish(&self, _message: EventEnvelope<LedgerRecord>) -> Result<(), String> {
            Err("bus down".to_string())
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<LedgerRecord>> {
            Subscription::new(std::sync::mpsc::channel().1)
        }
    }

    #[test]
    fn failed_publish_still_journals_the_record() {
        let mut engine = PayrollEngine::new(
            EngineConfig::default(),
            InMemorySettlement::new(),
            FailingBus,
        );
        let err = engine
            .create_company(IdentityId::new(), "Acme", at(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Publish(_)));

        // The record was appended and folded before fan-out was attempted.
        assert_eq!(engine.journal().len(), 1);
        assert_eq!(engine.get_global_stats().companies_created, 1);
    }
}
