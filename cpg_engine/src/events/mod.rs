//! Order lifecycle notifications.
//!
//! Components that care about new orders (reconciliation alerts, confirmation emails, analytics) register a hook in
//! [`EventHooks`]. The checkout core publishes to the hooks through [`EventProducers`] and never waits for them to run.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::OrderCreatedEvent;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
