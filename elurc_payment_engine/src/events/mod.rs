//! The outbox.
//!
//! Flows in the engine never call out to notification services directly. Instead they publish events through
//! [`EventProducers`], and whoever assembles the process registers [`EventHooks`] to react to them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
