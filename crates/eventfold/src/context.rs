// File: src/context.rs
//
// Task-scoped execution context for correlation and causation tracking

use std::cell::RefCell;
use std::future::Future;

use uuid::Uuid;

use crate::domain::new_id;

/// Immutable context tracking the causal chain of the current operation.
///
/// The context carries three identifiers:
/// - `correlation_id` traces an entire logical operation across all commands
///   and events it produces. It stays constant throughout the flow.
/// - `causation_id` identifies what directly caused the current work. For
///   events this is the command that triggered them; for commands dispatched
///   from a processor it is the event being processed.
/// - `command_id` identifies the command currently being handled. Events
///   emitted while it is set take it as their causation id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub correlation_id: Option<Uuid>,
    pub causation_id: Option<Uuid>,
    pub command_id: Option<Uuid>,
}

impl ExecutionContext {
    /// Create a fresh context at a system entry point.
    ///
    /// If no correlation id is given, a new one is generated. At entry
    /// points the causation id self-references the correlation id.
    pub fn create(correlation_id: Option<Uuid>) -> Self {
        let correlation_id = correlation_id.unwrap_or_else(new_id);
        Self {
            correlation_id: Some(correlation_id),
            causation_id: Some(correlation_id),
            command_id: None,
        }
    }

    /// Derive the context for executing a command: same correlation,
    /// `command_id` set.
    pub fn for_command(self, command_id: Uuid) -> Self {
        Self {
            command_id: Some(command_id),
            ..self
        }
    }

    /// Derive the context for processing an event: same correlation, the
    /// event becomes the causation, and the command id is cleared.
    pub fn for_event(self, event_id: Uuid) -> Self {
        Self {
            causation_id: Some(event_id),
            command_id: None,
            ..self
        }
    }

    pub fn with_causation(self, causation_id: Uuid) -> Self {
        Self {
            causation_id: Some(causation_id),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.correlation_id.is_none() && self.causation_id.is_none() && self.command_id.is_none()
    }
}

tokio::task_local! {
    static ACTIVE_CONTEXT: RefCell<ExecutionContext>;
}

/// Get the execution context of the current task.
///
/// Returns an empty context when none has been established.
pub fn get_context() -> ExecutionContext {
    ACTIVE_CONTEXT
        .try_with(|ctx| *ctx.borrow())
        .unwrap_or_default()
}

/// Replace the context of the current task.
///
/// Only affects the current task; sibling tasks keep their own contexts.
/// Returns false when no context scope is active for this task (the call
/// then has no effect).
pub fn set_context(context: ExecutionContext) -> bool {
    ACTIVE_CONTEXT
        .try_with(|ctx| *ctx.borrow_mut() = context)
        .is_ok()
}

/// Reset the current task's context to the empty triple.
pub fn clear_context() {
    let _ = ACTIVE_CONTEXT.try_with(|ctx| *ctx.borrow_mut() = ExecutionContext::default());
}

/// Get the current context, establishing a fresh one if the task has an
/// active scope but no identifiers yet. Useful at system entry points.
pub fn get_or_create_context() -> ExecutionContext {
    let current = get_context();
    if !current.is_empty() {
        return current;
    }
    let created = ExecutionContext::create(None);
    set_context(created);
    created
}

/// Run a future with the given context active for the current task.
///
/// The context is dropped on every exit path: normal completion, error
/// return, and cancellation. Scopes nest; the enclosing scope's context is
/// visible again once the inner future finishes.
pub async fn with_context<F: Future>(context: ExecutionContext, future: F) -> F::Output {
    ACTIVE_CONTEXT.scope(RefCell::new(context), future).await
}
