// File: src/commands/middleware/mod.rs
//
// Built-in command middleware: context propagation, logging, concurrency
// retry, idempotency

pub mod concurrency;
pub mod context;
pub mod idempotency;
pub mod logging;

pub use concurrency::ConcurrencyRetryMiddleware;
pub use context::ContextPropagationMiddleware;
pub use idempotency::{
    IdempotencyMiddleware, IdempotencyStore, InMemoryIdempotencyStore, NullIdempotencyStore,
};
pub use logging::LoggingMiddleware;
