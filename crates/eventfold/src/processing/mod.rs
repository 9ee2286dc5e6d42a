// File: src/processing/mod.rs
//
// Event processing runtime: processors, the executor loop, catchup, sagas

pub mod checkpoint;
pub mod conditions;
pub mod config;
pub mod executor;
pub mod processor;
pub mod projectors;
pub mod saga;
pub mod saga_state_store;
pub mod strategies;

pub use checkpoint::{Checkpoint, CheckpointBackend, InMemoryCheckpointBackend};
pub use conditions::{CatchupCondition, Lag};
pub use config::{ProcessorConfigRegistry, ProcessorExecutionConfig};
pub use executor::EventProcessorExecutor;
pub use processor::EventProcessor;
pub use projectors::{typed_projector, AggregateProjector, TypedProjector};
pub use saga::{HasSagaId, Saga, StepOutcome};
pub use saga_state_store::{InMemorySagaStateStore, SagaStateStore};
pub use strategies::{
    CatchupResult, CatchupStrategy, FromAggregateSnapshot, NoCatchup, ReplayAllEvents,
};
