//! Ledger error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Domain-level error.
///
/// Every variant is a deterministic business failure. An error always means
/// the triggering operation committed nothing: prior state is fully intact
/// and the caller decides whether to retry with corrected input. There is no
/// fatal class — the ledger has no unrecoverable internal state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller lacks the required role or identity for the target company.
    #[error("unauthorized")]
    Unauthorized,

    /// A stream, company, account, or bonus does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Zero or out-of-range amount, percent above 100, empty name, past
    /// unlock time, or an arithmetic overflow in a derived quantity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A reservation or payout exceeds the account's backing capital.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    /// Duplicate stream, duplicate role, last-CEO removal, paused-state
    /// mismatch, or an off-boarding ordering violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Zero withdrawable amount or zero accrued yield.
    #[error("nothing to claim: {0}")]
    NothingToClaim(String),
}

impl LedgerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn nothing_to_claim(msg: impl Into<String>) -> Self {
        Self::NothingToClaim(msg.into())
    }

    pub fn insufficient_funds(requested: u64, available: u64) -> Self {
        Self::InsufficientFunds {
            requested,
            available,
        }
    }
}
