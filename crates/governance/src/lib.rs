//! Governance Layer: per-company role registry and employee roster.
//!
//! Three-tier hierarchy without inheritance: CEO does not implicitly hold HR
//! privileges — every privileged operation states "CEO only" or "HR or CEO"
//! explicitly, and callers are re-validated against the specific company on
//! every mutating call.

pub mod company;

pub use company::{
    Company, GovernanceCommand, GovernanceEvent, Role, require_ceo, require_manager,
};
