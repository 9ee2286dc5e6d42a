// File: src/domain/event.rs
//
// Immutable event record wrapping a typed payload with stream metadata

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{new_id, utc_now};

/// Marker for types that can travel as event payloads.
///
/// Blanket-implemented for every `Any + Send + Sync + Debug` type, so plain
/// domain structs qualify without ceremony. The payload's concrete type is
/// the routing key for appliers, processors, and upcasters.
pub trait EventPayload: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Qualified type name of the payload, for diagnostics and logging.
    fn payload_name(&self) -> &'static str;
}

impl<T> EventPayload for T
where
    T: Any + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn payload_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Immutable record of a state change in an aggregate.
///
/// Each event is a fact that occurred in the past: it carries a unique id,
/// the id of the aggregate that produced it, a 1-based sequence number that
/// totally orders the aggregate's stream, a UTC timestamp, and optional
/// correlation/causation ids connecting it to the operation that caused it.
///
/// Events are created by an aggregate's emit operation or by the upcasting
/// pipeline, which replaces only the payload and preserves everything else.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub causation_id: Option<Uuid>,
    data: Arc<dyn EventPayload>,
}

impl Event {
    pub fn new(aggregate_id: Uuid, sequence_number: u64, payload: impl EventPayload) -> Self {
        Self {
            id: new_id(),
            aggregate_id,
            sequence_number,
            timestamp: utc_now(),
            correlation_id: None,
            causation_id: None,
            data: Arc::new(payload),
        }
    }

    pub(crate) fn from_parts(
        aggregate_id: Uuid,
        sequence_number: u64,
        timestamp: DateTime<Utc>,
        correlation_id: Option<Uuid>,
        causation_id: Option<Uuid>,
        data: Arc<dyn EventPayload>,
    ) -> Self {
        Self {
            id: new_id(),
            aggregate_id,
            sequence_number,
            timestamp,
            correlation_id,
            causation_id,
            data,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_causation_id(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Downcast the payload to a concrete type.
    pub fn payload<T: EventPayload>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }

    pub fn payload_is<T: EventPayload>(&self) -> bool {
        self.data.as_any().is::<T>()
    }

    pub fn payload_type_id(&self) -> TypeId {
        self.data.as_any().type_id()
    }

    pub fn payload_name(&self) -> &'static str {
        self.data.payload_name()
    }

    pub fn data(&self) -> &Arc<dyn EventPayload> {
        &self.data
    }

    /// Produce a copy of this event carrying a different payload.
    ///
    /// Identity, stream position, timestamp, and the correlation/causation
    /// ids are preserved; only the payload changes. This is the operation
    /// upcasters use for schema evolution.
    pub fn replace_payload(&self, data: Arc<dyn EventPayload>) -> Event {
        Event {
            id: self.id,
            aggregate_id: self.aggregate_id,
            sequence_number: self.sequence_number,
            timestamp: self.timestamp,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            data,
        }
    }
}
