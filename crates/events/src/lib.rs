//! Domain events and the in-process notification bus.
//!
//! Mutating operations (transfer transitions, ledger writes) emit typed events.
//! After the owning unit of work commits, they are wrapped in an
//! [`EventEnvelope`] and published on an [`EventBus`] so read-side caches and
//! reporting consumers can refresh exactly what changed.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::{EnvelopeError, EventEnvelope};
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
