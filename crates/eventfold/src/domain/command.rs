// File: src/domain/command.rs
//
// Command trait and the dispatch-time envelope carried through middleware

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::new_id;

/// Intent to change state, targeting one aggregate instance.
///
/// Implement this for plain structs. Only `aggregate_id` is required;
/// correlation/causation ids and the idempotency key are opt-in.
///
/// Commands that expose an [`idempotency_key`](Command::idempotency_key)
/// are deduplicated by the idempotency middleware: a key that has already
/// been recorded short-circuits the dispatch with
/// [`DispatchOutcome::SkippedDuplicate`].
pub trait Command: Any + Send + Sync + fmt::Debug {
    /// The aggregate instance this command operates on.
    fn aggregate_id(&self) -> Uuid;

    fn correlation_id(&self) -> Option<Uuid> {
        None
    }

    fn causation_id(&self) -> Option<Uuid> {
        None
    }

    fn idempotency_key(&self) -> Option<String> {
        None
    }
}

/// A command captured for dispatch: a fresh `command_id`, the metadata the
/// middleware chain operates on, and the type-erased payload routed to the
/// aggregate's handler.
#[derive(Debug, Clone)]
pub struct CommandEnvelope {
    command_id: Uuid,
    aggregate_id: Uuid,
    correlation_id: Option<Uuid>,
    causation_id: Option<Uuid>,
    idempotency_key: Option<String>,
    command_name: &'static str,
    type_id: TypeId,
    payload: Arc<dyn Any + Send + Sync>,
}

impl CommandEnvelope {
    pub fn new<C: Command>(command: C) -> Self {
        Self {
            command_id: new_id(),
            aggregate_id: command.aggregate_id(),
            correlation_id: command.correlation_id(),
            causation_id: command.causation_id(),
            idempotency_key: command.idempotency_key(),
            command_name: type_name::<C>(),
            type_id: TypeId::of::<C>(),
            payload: Arc::new(command),
        }
    }

    pub fn command_id(&self) -> Uuid {
        self.command_id
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }

    pub fn causation_id(&self) -> Option<Uuid> {
        self.causation_id
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn command_name(&self) -> &'static str {
        self.command_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Downcast the payload to the concrete command type.
    pub fn payload<C: Command>(&self) -> Option<&C> {
        self.payload.downcast_ref::<C>()
    }

    pub(crate) fn payload_any(&self) -> &(dyn Any + Send + Sync) {
        self.payload.as_ref()
    }
}

/// Result of dispatching a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command reached its handler and completed.
    Completed,
    /// The idempotency middleware recognized a previously processed key and
    /// skipped the handler. Not an error.
    SkippedDuplicate,
}
