// File: src/commands/mod.rs
//
// Command pipeline: bus, middleware chain, delegate-to-aggregate routing

pub mod bus;
pub mod middleware;

pub use bus::{CommandBus, CommandMiddleware, CommandTarget, CommandTargetRegistry, Next};
pub use middleware::{
    ConcurrencyRetryMiddleware, ContextPropagationMiddleware, IdempotencyMiddleware,
    IdempotencyStore, InMemoryIdempotencyStore, LoggingMiddleware, NullIdempotencyStore,
};
