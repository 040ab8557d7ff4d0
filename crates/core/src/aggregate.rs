//! Aggregate traits: the decide/apply split every ledger component follows.

/// Aggregate root marker + minimal interface.
///
/// Intentionally small so each bounded context decides how it models state
/// transitions without bringing in any infrastructure concerns.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state; +1 per
    /// applied event.
    fn version(&self) -> u64;
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events or rejects.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// `handle` must not mutate and must not perform IO; this split is what gives
/// every operation its all-or-nothing guarantee — the writer decides across
/// all involved aggregates first, and applies only if every decision
/// succeeded.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event. Must be deterministic and
    /// infallible: `handle` has already validated everything.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
