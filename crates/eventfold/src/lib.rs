// File: src/lib.rs
//
// eventfold: event-sourcing and CQRS application framework
//
// State changes are recorded as ordered, immutable events; writes are
// commands routed to aggregates; reads are served by projections that
// consume events into denormalized views; long-running processes are
// coordinated by sagas with per-step idempotency.

//! An in-process event-sourcing / CQRS runtime.
//!
//! The pieces, leaves first:
//!
//! - [`routing`] — type-directed dispatch tables built from registration
//!   functions; exact-type lookup with per-surface defaults.
//! - [`context`] — task-scoped correlation/causation/command triple.
//! - [`events`] — event store (optimistic concurrency), upcasting
//!   pipeline, transport, delivery strategies, and the event bus.
//! - [`domain`] — events, aggregates, commands, queries.
//! - [`aggregates`] — repositories with cache + snapshot + replay and
//!   save-or-discard scoping.
//! - [`commands`] — the command bus and its middleware (context
//!   propagation, logging, concurrency retry, idempotency).
//! - [`projections`] — read models with typed queries and the query bus.
//! - [`processing`] — the processor executor loop, lag-driven catchup,
//!   and sagas.
//! - [`application`] — dependency container, builder, and the wired
//!   [`Application`](application::Application).
//!
//! ```ignore
//! let app = ApplicationBuilder::new()
//!     .use_correlation_tracking()
//!     .add_aggregate::<BankAccount>()
//!     .add_projection(Arc::new(AccountBalances::new()))
//!     .build()?;
//!
//! app.dispatch(OpenAccount { account_id, owner: "Alice".into() }).await?;
//! let balance = app.query(GetBalance { account_id }).await?;
//! ```

pub mod aggregates;
pub mod application;
pub mod commands;
pub mod context;
pub mod domain;
pub mod error;
pub mod events;
pub mod processing;
pub mod projections;
pub mod routing;

pub use aggregates::{
    AggregateCache, AggregateRepository, CacheStrategy, InMemoryAggregateCache,
    InMemorySnapshotStore, NullAggregateCache, NullSnapshotStore, RepositoryConfig,
    RepositoryConfigRegistry, SnapshotMode, SnapshotRecord, SnapshotStore, SnapshotStrategy,
};
pub use application::{Application, ApplicationBuilder, DependencyContainer, DependencyKey};
pub use commands::{
    CommandBus, CommandMiddleware, CommandTarget, CommandTargetRegistry,
    ConcurrencyRetryMiddleware, ContextPropagationMiddleware, IdempotencyMiddleware,
    IdempotencyStore, InMemoryIdempotencyStore, LoggingMiddleware, Next, NullIdempotencyStore,
};
pub use context::{
    clear_context, get_context, get_or_create_context, set_context, with_context, ExecutionContext,
};
pub use domain::{
    new_id, utc_now, Aggregate, AggregateCell, AggregateRoot, Command, CommandEnvelope,
    DispatchOutcome, Event, EventPayload, Query, QueryEnvelope, QueryValue,
};
pub use error::{FrameworkError, FrameworkResult};
pub use events::{
    AsynchronousDelivery, EventBus, EventDelivery, EventStore, EventSubscription, EventTransport,
    EventUpcaster, InMemoryEventStore, InMemoryEventTransport, PayloadUpcaster, SynchronousDelivery,
    UpcasterMap, UpcastingConfig, UpcastingPipeline, UpcastingStrategy,
};
pub use processing::{
    typed_projector, AggregateProjector, CatchupCondition, CatchupResult, CatchupStrategy,
    Checkpoint, CheckpointBackend, EventProcessor, EventProcessorExecutor, FromAggregateSnapshot,
    HasSagaId, InMemoryCheckpointBackend, InMemorySagaStateStore, Lag, NoCatchup,
    ProcessorConfigRegistry, ProcessorExecutionConfig, ReplayAllEvents, Saga, SagaStateStore,
    StepOutcome,
};
pub use projections::{Projection, QueryBus, QueryMiddleware, QueryNext};
pub use routing::{
    AggregateRoutes, EventRoutes, HandlerFn, InterceptFn, InterceptRoutes, QueryRoutes,
};
