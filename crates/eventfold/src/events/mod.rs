// File: src/events/mod.rs
//
// Event pipeline: store, upcasting, transport, delivery, and the bus that
// ties them together

pub mod bus;
pub mod delivery;
pub mod store;
pub mod transport;
pub mod upcasting;

pub use bus::EventBus;
pub use delivery::{AsynchronousDelivery, EventDelivery, SynchronousDelivery};
pub use store::{EventStore, InMemoryEventStore};
pub use transport::{
    EventSubscription, EventTransport, InMemoryEventSubscription, InMemoryEventTransport,
};
pub use upcasting::{
    EventUpcaster, PayloadUpcaster, UpcasterMap, UpcastingConfig, UpcastingPipeline,
    UpcastingStrategy, DEFAULT_MAX_UPCAST_STEPS,
};
