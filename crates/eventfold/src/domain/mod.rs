// File: src/domain/mod.rs
//
// Core domain model for event sourcing: events, aggregates, commands, queries

pub mod aggregate;
pub mod command;
pub mod event;
pub mod query;

pub use aggregate::{Aggregate, AggregateCell, AggregateRoot};
pub use command::{Command, CommandEnvelope, DispatchOutcome};
pub use event::{Event, EventPayload};
pub use query::{Query, QueryEnvelope, QueryValue};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new identifier.
///
/// Identifiers are UUID v7: sortable, time-ordered 128-bit values usable as
/// both identity and ordering hint. The same identifier type is used for
/// aggregates, events, commands, queries, and correlation/causation ids.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Current UTC timestamp. All events are stamped in UTC regardless of the
/// system timezone.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}
