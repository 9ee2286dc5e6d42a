// File: src/domain/aggregate.rs
//
// Aggregate root: consistency boundary that emits events for state changes

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::get_context;
use crate::routing::AggregateRoutes;

use super::event::{Event, EventPayload};
use super::utc_now;

/// Bookkeeping shared by every aggregate: identity, version, activity
/// timestamps, and the uncommitted-events list.
///
/// The version equals the sequence number of the last applied event.
/// Uncommitted events are owned by the aggregate until the repository
/// persists them, then cleared; they are excluded from serialization so
/// snapshots never carry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRoot {
    pub id: Uuid,
    pub version: u64,
    pub last_snapshot_time: DateTime<Utc>,
    pub last_event_time: DateTime<Utc>,
    #[serde(skip)]
    uncommitted_events: Vec<Event>,
}

impl AggregateRoot {
    pub fn new(id: Uuid) -> Self {
        let now = utc_now();
        Self {
            id,
            version: 0,
            last_snapshot_time: now,
            last_event_time: now,
            uncommitted_events: Vec::new(),
        }
    }

    /// True if the current version is greater than the given one.
    pub fn changed_since(&self, version: u64) -> bool {
        self.version > version
    }

    /// Record that a snapshot of this aggregate was just taken.
    pub fn mark_snapshot(&mut self) {
        self.last_snapshot_time = utc_now();
    }

    pub fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted_events
    }

    /// Hand over the uncommitted events, leaving the list empty.
    pub fn take_uncommitted(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.uncommitted_events)
    }

    pub fn clear_uncommitted(&mut self) {
        self.uncommitted_events.clear();
    }

    pub(crate) fn push_uncommitted(&mut self, event: Event) {
        self.uncommitted_events.push(event);
    }
}

/// A domain object whose state changes are expressed as events.
///
/// Implementations hold their user state plus an embedded [`AggregateRoot`]
/// and register command handlers and event appliers in
/// [`configure`](Aggregate::configure):
///
/// ```ignore
/// impl Aggregate for BankAccount {
///     fn aggregate_type() -> &'static str { "bank_account" }
///     fn new(id: Uuid) -> Self { /* ... */ }
///     fn root(&self) -> &AggregateRoot { &self.root }
///     fn root_mut(&mut self) -> &mut AggregateRoot { &mut self.root }
///     fn configure(routes: &mut AggregateRoutes<Self>) {
///         routes.command(Self::open);
///         routes.command(Self::deposit);
///         routes.apply(Self::apply_opened);
///         routes.apply(Self::apply_deposited);
///     }
/// }
/// ```
///
/// Command handlers receive an [`AggregateCell`] and call
/// [`emit`](AggregateCell::emit) to record state changes; appliers are pure
/// state mutations and receive `&mut Self` only, so they cannot emit.
pub trait Aggregate: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name for this aggregate type, used in snapshots and for
    /// listing aggregate ids during catchup.
    fn aggregate_type() -> &'static str;

    /// A fresh, never-event-sourced instance with the given identity.
    fn new(id: Uuid) -> Self;

    fn root(&self) -> &AggregateRoot;

    fn root_mut(&mut self) -> &mut AggregateRoot;

    /// Register command handlers and event appliers for this aggregate.
    fn configure(routes: &mut AggregateRoutes<Self>);
}

/// Handler-facing view of a loaded aggregate.
///
/// Dereferences to the aggregate state and adds [`emit`](Self::emit), which
/// appends one event with `sequence_number = version + 1`, stamps it from
/// the ambient execution context, increments the version, and applies the
/// event to the aggregate.
pub struct AggregateCell<'a, A: Aggregate> {
    state: &'a mut A,
    routes: &'a AggregateRoutes<A>,
}

impl<'a, A: Aggregate> AggregateCell<'a, A> {
    /// Wrap a loaded aggregate with its routes. Repositories do this for
    /// every acquire; test harnesses may drive an aggregate directly.
    pub fn new(state: &'a mut A, routes: &'a AggregateRoutes<A>) -> Self {
        Self { state, routes }
    }

    pub fn id(&self) -> Uuid {
        self.state.root().id
    }

    pub fn version(&self) -> u64 {
        self.state.root().version
    }

    /// Emit a domain event and apply it to the aggregate state.
    ///
    /// The event inherits `correlation_id` from the execution context and
    /// takes the context's `command_id` as its `causation_id`, connecting
    /// the event to the command that produced it.
    pub fn emit<T: EventPayload + Clone>(&mut self, payload: T) {
        let ctx = get_context();
        let now = utc_now();

        let root = self.state.root_mut();
        root.version += 1;
        let event = Event::from_parts(
            root.id,
            root.version,
            now,
            ctx.correlation_id,
            ctx.command_id,
            std::sync::Arc::new(payload.clone()),
        );
        root.last_event_time = now;
        root.push_uncommitted(event);

        let routes = self.routes;
        routes.dispatch_apply(self.state, &payload);
    }

    /// Route a command to its registered handler. Fails with `NoHandler`
    /// for command types the aggregate does not handle.
    pub fn handle(
        &mut self,
        command: &crate::domain::CommandEnvelope,
    ) -> crate::error::FrameworkResult<()> {
        let routes = self.routes;
        routes.dispatch_command(self, command)
    }
}

impl<'a, A: Aggregate> Deref for AggregateCell<'a, A> {
    type Target = A;

    fn deref(&self) -> &A {
        self.state
    }
}

impl<'a, A: Aggregate> DerefMut for AggregateCell<'a, A> {
    fn deref_mut(&mut self) -> &mut A {
        self.state
    }
}
