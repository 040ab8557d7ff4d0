use crate::{Event, EventEnvelope};

/// A projection folds committed records into a queryable read model.
///
/// The journal is the source of truth; read models are disposable views that
/// can be rebuilt from scratch by replaying envelopes in sequence order.
///
/// Implementations must be **idempotent**: applying the same envelope twice
/// must not change the result. The usual strategy is tracking the last
/// applied sequence number and skipping anything at or below it, which also
/// makes at-least-once delivery from the bus safe.
pub trait Projection {
    type Ev: Event;

    /// Apply a single committed record, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
