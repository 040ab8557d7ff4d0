//! Payout seam: the irreversible external transfer of value.
//!
//! The ledger never holds payee balances itself — releasing reserved capital
//! hands value to a settlement gateway (a token bridge, a bank adapter, an
//! in-memory fake in tests). A rejected transfer aborts the whole triggering
//! operation before any ledger state is touched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use paystream_core::{CompanyId, IdentityId};

/// Destination of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Payee {
    /// An employee or account owner.
    Identity(IdentityId),
    /// A company's tax vault.
    TaxVault(CompanyId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// External transfer mechanism.
///
/// Implementations must be all-or-nothing per call: either the full amount
/// reaches the payee or an error is returned and nothing moved.
pub trait SettlementGateway {
    fn transfer(&mut self, payee: Payee, amount: u64) -> Result<(), SettlementError>;
}

/// In-memory gateway for tests/embedded use: transfers always succeed and
/// accumulate per-payee balances for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemorySettlement {
    balances: HashMap<Payee, u64>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, payee: Payee) -> u64 {
        self.balances.get(&payee).copied().unwrap_or(0)
    }
}

impl SettlementGateway for InMemorySettlement {
    fn transfer(&mut self, payee: Payee, amount: u64) -> Result<(), SettlementError> {
        *self.balances.entry(payee).or_default() += amount;
        Ok(())
    }
}
