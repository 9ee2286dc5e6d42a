// File: src/error.rs
//
// Error taxonomy for the event sourcing framework

use std::any::type_name;

/// Result type for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;

/// Error types for framework operations
#[derive(Debug, thiserror::Error, Clone)]
pub enum FrameworkError {
    /// Optimistic-concurrency violation raised by the event store on save.
    /// Caught by the concurrency-retry middleware when configured.
    #[error("Concurrency conflict: {message}")]
    ConcurrencyConflict { message: String },

    /// No handler registered for a message type whose router defaults to raise
    /// (commands and queries). Always a programming error.
    #[error("No {operation} registered for message type {message_type}")]
    NoHandler {
        operation: &'static str,
        message_type: String,
    },

    /// Upcasting chain did not converge within the configured step bound.
    #[error("Upcasting exceeded {max_steps} steps; possible circular upcasting chain for {payload_type}")]
    UpcastingCycle {
        max_steps: usize,
        payload_type: String,
    },

    /// Failure raised by a command handler, event handler, or projector.
    #[error("Handler error: {message}")]
    Handler { message: String },

    /// The event subscription has ended. Terminates processor executors cleanly.
    #[error("Subscription closed")]
    SubscriptionClosed,

    /// The dependency container could not resolve the registered graph.
    #[error("Dependency resolution failed: {message}")]
    DependencyResolution { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl FrameworkError {
    pub fn concurrency(message: impl Into<String>) -> Self {
        FrameworkError::ConcurrencyConflict {
            message: message.into(),
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        FrameworkError::Handler {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        FrameworkError::Configuration {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        FrameworkError::Storage {
            message: message.into(),
        }
    }

    pub fn no_handler_for<M: 'static>(operation: &'static str) -> Self {
        FrameworkError::NoHandler {
            operation,
            message_type: type_name::<M>().to_string(),
        }
    }

    /// True for errors the concurrency-retry middleware is allowed to retry.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, FrameworkError::ConcurrencyConflict { .. })
    }
}

impl From<serde_json::Error> for FrameworkError {
    fn from(error: serde_json::Error) -> Self {
        FrameworkError::Serialization {
            message: error.to_string(),
        }
    }
}
