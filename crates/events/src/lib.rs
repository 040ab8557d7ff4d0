//! Transition-record plumbing: every committed mutating operation emits one
//! or more immutable records, wrapped in envelopes carrying the global commit
//! order, appended to the journal and fanned out to subscribers.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
pub use projection::Projection;
