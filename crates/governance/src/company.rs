use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paystream_core::{Aggregate, AggregateRoot, CompanyId, IdentityId, LedgerError, Roster};
use paystream_events::Event;

/// Closed role set. A identity holds at most one role per company; absence
/// from the registry means `None`. There is no inheritance between tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    None,
    Hr,
    Ceo,
}

/// Caller must hold CEO in this company.
pub fn require_ceo(company: &Company, caller: IdentityId) -> Result<(), LedgerError> {
    if company.role_of(caller) == Role::Ceo {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized)
    }
}

/// Caller must hold HR or CEO in this company (explicit check, no
/// inheritance).
pub fn require_manager(company: &Company, caller: IdentityId) -> Result<(), LedgerError> {
    match company.role_of(caller) {
        Role::Hr | Role::Ceo => Ok(()),
        Role::None => Err(LedgerError::Unauthorized),
    }
}

/// Aggregate root: a company — its owning identity, display name, role
/// registry, and employee roster.
///
/// Invariant: a created company always has at least one CEO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    id: CompanyId,
    owner: IdentityId,
    name: String,
    roles: HashMap<IdentityId, Role>,
    employees: Roster,
    version: u64,
    created: bool,
}

impl Company {
    /// Empty aggregate: the state before `Create`.
    pub fn empty(id: CompanyId) -> Self {
        Self {
            id,
            owner: IdentityId::nil(),
            name: String::new(),
            roles: HashMap::new(),
            employees: Roster::new(),
            version: 0,
            created: false,
        }
    }

    pub fn company_id(&self) -> CompanyId {
        self.id
    }

    /// The identity whose treasury account backs this company's payroll.
    pub fn owner(&self) -> IdentityId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role_of(&self, identity: IdentityId) -> Role {
        self.roles.get(&identity).copied().unwrap_or(Role::None)
    }

    /// Counted from the live registry on every check, never cached.
    pub fn ceo_count(&self) -> usize {
        self.roles.values().filter(|r| **r == Role::Ceo).count()
    }

    /// Whether streams/bonuses may target this identity.
    pub fn is_registered_employee(&self, identity: IdentityId) -> bool {
        self.employees.contains(identity)
    }

    /// Every identity ever added and not yet removed (survives stream
    /// cancellation).
    pub fn employees(&self) -> &[IdentityId] {
        self.employees.as_slice()
    }

    pub fn roles_snapshot(&self) -> Vec<(IdentityId, Role)> {
        let mut out: Vec<(IdentityId, Role)> =
            self.roles.iter().map(|(id, role)| (*id, *role)).collect();
        out.sort_by_key(|(id, _)| *id.as_uuid());
        out
    }
}

impl AggregateRoot for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceCommand {
    /// Register the company; the creator becomes its sole CEO and owner.
    Create {
        owner: IdentityId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
    Rename {
        name: String,
        occurred_at: DateTime<Utc>,
    },
    AddCeo {
        target: IdentityId,
        occurred_at: DateTime<Utc>,
    },
    RemoveCeo {
        target: IdentityId,
        occurred_at: DateTime<Utc>,
    },
    AddHr {
        target: IdentityId,
        occurred_at: DateTime<Utc>,
    },
    RemoveHr {
        target: IdentityId,
        occurred_at: DateTime<Utc>,
    },
    AddEmployee {
        target: IdentityId,
        occurred_at: DateTime<Utc>,
    },
    /// The engine rejects this while the target has a live stream in this
    /// company; off-boarding requires cancelling the stream first.
    RemoveEmployee {
        target: IdentityId,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCreated {
    pub company_id: CompanyId,
    pub owner: IdentityId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRenamed {
    pub company_id: CompanyId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGranted {
    pub company_id: CompanyId,
    pub identity: IdentityId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRevoked {
    pub company_id: CompanyId,
    pub identity: IdentityId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeAdded {
    pub company_id: CompanyId,
    pub identity: IdentityId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRemoved {
    pub company_id: CompanyId,
    pub identity: IdentityId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceEvent {
    CompanyCreated(CompanyCreated),
    CompanyRenamed(CompanyRenamed),
    RoleGranted(RoleGranted),
    RoleRevoked(RoleRevoked),
    EmployeeAdded(EmployeeAdded),
    EmployeeRemoved(EmployeeRemoved),
}

impl GovernanceEvent {
    pub fn company_id(&self) -> CompanyId {
        match self {
            GovernanceEvent::CompanyCreated(e) => e.company_id,
            GovernanceEvent::CompanyRenamed(e) => e.company_id,
            GovernanceEvent::RoleGranted(e) => e.company_id,
            GovernanceEvent::RoleRevoked(e) => e.company_id,
            GovernanceEvent::EmployeeAdded(e) => e.company_id,
            GovernanceEvent::EmployeeRemoved(e) => e.company_id,
        }
    }
}

impl Event for GovernanceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GovernanceEvent::CompanyCreated(_) => "governance.company.created",
            GovernanceEvent::CompanyRenamed(_) => "governance.company.renamed",
            GovernanceEvent::RoleGranted(_) => "governance.company.role_granted",
            GovernanceEvent::RoleRevoked(_) => "governance.company.role_revoked",
            GovernanceEvent::EmployeeAdded(_) => "governance.company.employee_added",
            GovernanceEvent::EmployeeRemoved(_) => "governance.company.employee_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GovernanceEvent::CompanyCreated(e) => e.occurred_at,
            GovernanceEvent::CompanyRenamed(e) => e.occurred_at,
            GovernanceEvent::RoleGranted(e) => e.occurred_at,
            GovernanceEvent::RoleRevoked(e) => e.occurred_at,
            GovernanceEvent::EmployeeAdded(e) => e.occurred_at,
            GovernanceEvent::EmployeeRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Company {
    type Command = GovernanceCommand;
    type Event = GovernanceEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GovernanceEvent::CompanyCreated(e) => {
                self.owner = e.owner;
                self.name = e.name.clone();
                self.roles.insert(e.owner, Role::Ceo);
                self.created = true;
            }
            GovernanceEvent::CompanyRenamed(e) => {
                self.name = e.name.clone();
            }
            GovernanceEvent::RoleGranted(e) => {
                self.roles.insert(e.identity, e.role);
            }
            GovernanceEvent::RoleRevoked(e) => {
                self.roles.remove(&e.identity);
            }
            GovernanceEvent::EmployeeAdded(e) => {
                self.employees.insert(e.identity);
            }
            GovernanceEvent::EmployeeRemoved(e) => {
                self.employees.remove(e.identity);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GovernanceCommand::Create {
                owner,
                name,
                occurred_at,
            } => {
                if self.created {
                    return Err(LedgerError::conflict("company already created"));
                }
                if owner.is_nil() {
                    return Err(LedgerError::invalid_argument("owner identity must not be nil"));
                }
                if name.trim().is_empty() {
                    return Err(LedgerError::invalid_argument("company name must not be empty"));
                }
                Ok(vec![GovernanceEvent::CompanyCreated(CompanyCreated {
                    company_id: self.id,
                    owner: *owner,
                    name: name.clone(),
                    occurred_at: *occurred_at,
                })])
            }
            GovernanceCommand::Rename { name, occurred_at } => {
                self.require_created()?;
                if name.trim().is_empty() {
                    return Err(LedgerError::invalid_argument("company name must not be empty"));
                }
                Ok(vec![GovernanceEvent::CompanyRenamed(CompanyRenamed {
                    company_id: self.id,
                    name: name.clone(),
                    occurred_at: *occurred_at,
                })])
            }
            GovernanceCommand::AddCeo { target, occurred_at } => {
                self.handle_grant(*target, Role::Ceo, *occurred_at)
            }
            GovernanceCommand::AddHr { target, occurred_at } => {
                self.handle_grant(*target, Role::Hr, *occurred_at)
            }
            GovernanceCommand::RemoveCeo { target, occurred_at } => {
                self.require_created()?;
                if self.role_of(*target) != Role::Ceo {
                    return Err(LedgerError::not_found("identity does not hold CEO"));
                }
                if self.ceo_count() <= 1 {
                    return Err(LedgerError::conflict("cannot remove last CEO"));
                }
                Ok(vec![GovernanceEvent::RoleRevoked(RoleRevoked {
                    company_id: self.id,
                    identity: *target,
                    role: Role::Ceo,
                    occurred_at: *occurred_at,
                })])
            }
            GovernanceCommand::RemoveHr { target, occurred_at } => {
                self.require_created()?;
                if self.role_of(*target) != Role::Hr {
                    return Err(LedgerError::not_found("identity does not hold HR"));
                }
                Ok(vec![GovernanceEvent::RoleRevoked(RoleRevoked {
                    company_id: self.id,
                    identity: *target,
                    role: Role::Hr,
                    occurred_at: *occurred_at,
                })])
            }
            GovernanceCommand::AddEmployee { target, occurred_at } => {
                self.require_created()?;
                if target.is_nil() {
                    return Err(LedgerError::invalid_argument("employee identity must not be nil"));
                }
                if self.employees.contains(*target) {
                    return Err(LedgerError::conflict("identity is already an employee"));
                }
                Ok(vec![GovernanceEvent::EmployeeAdded(EmployeeAdded {
                    company_id: self.id,
                    identity: *target,
                    occurred_at: *occurred_at,
                })])
            }
            GovernanceCommand::RemoveEmployee { target, occurred_at } => {
                self.require_created()?;
                if !self.employees.contains(*target) {
                    return Err(LedgerError::not_found("identity is not an employee"));
                }
                Ok(vec![GovernanceEvent::EmployeeRemoved(EmployeeRemoved {
                    company_id: self.id,
                    identity: *target,
                    occurred_at: *occurred_at,
                })])
            }
        }
    }
}

impl Company {
    fn require_created(&self) -> Result<(), LedgerError> {
        if self.created {
            Ok(())
        } else {
            Err(LedgerError::not_found("company does not exist"))
        }
    }

    fn handle_grant(
        &self,
        target: IdentityId,
        role: Role,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GovernanceEvent>, LedgerError> {
        self.require_created()?;
        if target.is_nil() {
            return Err(LedgerError::invalid_argument("target identity must not be nil"));
        }
        if self.role_of(target) != Role::None {
            return Err(LedgerError::conflict("identity already holds a role"));
        }
        Ok(vec![GovernanceEvent::RoleGranted(RoleGranted {
            company_id: self.id,
            identity: target,
            role,
            occurred_at,
        })])
    }
}
