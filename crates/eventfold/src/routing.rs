// File: src/routing.rs
//
// Type-directed message routing: dispatch tables mapping message types to
// handlers for aggregates, processors, projections, and middleware.
//
// Dispatch is an exact TypeId lookup, never a subtype match. Each surface
// has its own default for unregistered types: commands and queries raise
// (a miss is a programming error), event appliers and processor handlers
// ignore (consumers pick what they react to), middleware interceptors
// forward to the next handler.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::commands::bus::Next;
use crate::domain::{
    Aggregate, AggregateCell, Command, CommandEnvelope, DispatchOutcome, Event, EventPayload,
    Query, QueryEnvelope, QueryValue,
};
use crate::error::{FrameworkError, FrameworkResult};

/// Boxed future used by type-erased handler entries.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapter trait that lets `async fn(&self, message)` methods and closures
/// be stored as routing entries.
///
/// The lifetime parameter ties the returned future to the borrowed state so
/// plain async methods satisfy the bound without boxing at the call site.
pub trait HandlerFn<'a, S: ?Sized, M>: Send + Sync + 'static {
    type Output;
    type Future: Future<Output = Self::Output> + Send + 'a;

    fn invoke(&self, state: &'a S, message: M) -> Self::Future;
}

impl<'a, S, M, F, Fut> HandlerFn<'a, S, M> for F
where
    S: ?Sized + 'a,
    F: Fn(&'a S, M) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'a,
{
    type Output = Fut::Output;
    type Future = Fut;

    fn invoke(&self, state: &'a S, message: M) -> Fut {
        self(state, message)
    }
}

// ================================
// Aggregate routing
// ================================

type ErasedCommandHandler<A> = Box<
    dyn for<'a, 'b, 'c> Fn(
            &'a mut AggregateCell<'b, A>,
            &'c (dyn Any + Send + Sync),
        ) -> FrameworkResult<()>
        + Send
        + Sync,
>;

type ErasedApplier<A> = Box<dyn Fn(&mut A, &dyn EventPayload) + Send + Sync>;

struct CommandEntry<A: Aggregate> {
    command_name: &'static str,
    invoke: ErasedCommandHandler<A>,
}

struct ApplierEntry<A> {
    payload_name: &'static str,
    invoke: ErasedApplier<A>,
}

/// Dispatch tables for one aggregate type: command handlers (default on
/// miss: raise) and event appliers (default on miss: ignore).
///
/// Registering the same message type twice is a programming error and
/// panics at registration time.
pub struct AggregateRoutes<A: Aggregate> {
    commands: HashMap<TypeId, CommandEntry<A>>,
    appliers: HashMap<TypeId, ApplierEntry<A>>,
}

impl<A: Aggregate> AggregateRoutes<A> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            appliers: HashMap::new(),
        }
    }

    /// Register a command handler. At most one handler per command type may
    /// exist across the aggregate.
    pub fn command<C, F>(&mut self, handler: F)
    where
        C: Command,
        F: Fn(&mut AggregateCell<'_, A>, &C) -> FrameworkResult<()> + Send + Sync + 'static,
    {
        let entry = CommandEntry {
            command_name: type_name::<C>(),
            invoke: Box::new(move |cell, any| match any.downcast_ref::<C>() {
                Some(command) => handler(cell, command),
                None => Err(FrameworkError::no_handler_for::<C>("command handler")),
            }),
        };
        if self.commands.insert(TypeId::of::<C>(), entry).is_some() {
            panic!(
                "command handler for {} registered twice on aggregate {}",
                type_name::<C>(),
                type_name::<A>()
            );
        }
    }

    /// Register an event applier: a pure state mutation for one payload
    /// type. Appliers cannot emit.
    pub fn apply<T, F>(&mut self, applier: F)
    where
        T: EventPayload,
        F: Fn(&mut A, &T) + Send + Sync + 'static,
    {
        let entry = ApplierEntry {
            payload_name: type_name::<T>(),
            invoke: Box::new(move |state, payload| {
                if let Some(payload) = payload.as_any().downcast_ref::<T>() {
                    applier(state, payload);
                }
            }),
        };
        if self.appliers.insert(TypeId::of::<T>(), entry).is_some() {
            panic!(
                "event applier for {} registered twice on aggregate {}",
                type_name::<T>(),
                type_name::<A>()
            );
        }
    }

    pub fn dispatch_command(
        &self,
        cell: &mut AggregateCell<'_, A>,
        command: &CommandEnvelope,
    ) -> FrameworkResult<()> {
        match self.commands.get(&command.type_id()) {
            Some(entry) => (entry.invoke)(cell, command.payload_any()),
            None => Err(FrameworkError::NoHandler {
                operation: "command handler",
                message_type: command.command_name().to_string(),
            }),
        }
    }

    /// Apply an event payload to the aggregate state. Unregistered payload
    /// types are ignored: an aggregate may legitimately skip events it did
    /// not emit.
    pub fn dispatch_apply(&self, state: &mut A, payload: &dyn EventPayload) {
        if let Some(entry) = self.appliers.get(&payload.as_any().type_id()) {
            (entry.invoke)(state, payload);
        }
    }

    /// The command types this aggregate handles, for building the
    /// command-to-repository dispatch table.
    pub fn command_types(&self) -> Vec<(TypeId, &'static str)> {
        self.commands
            .iter()
            .map(|(type_id, entry)| (*type_id, entry.command_name))
            .collect()
    }

    pub fn handles_command(&self, type_id: TypeId) -> bool {
        self.commands.contains_key(&type_id)
    }

    pub fn applier_names(&self) -> Vec<&'static str> {
        self.appliers.values().map(|e| e.payload_name).collect()
    }
}

impl<A: Aggregate> Default for AggregateRoutes<A> {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Event-handler routing (processors, projections, sagas)
// ================================

type ErasedEventHandler<P> = Box<
    dyn for<'a, 'b> Fn(&'a P, &'b Event) -> BoxFuture<'a, FrameworkResult<()>> + Send + Sync,
>;

struct EventEntry<P: ?Sized> {
    payload_name: &'static str,
    wants_wrapper: bool,
    invoke: ErasedEventHandler<P>,
}

/// Dispatch table routing events to a processor's async handlers.
///
/// Handlers come in two delivery forms, chosen at registration:
/// - [`on`](Self::on) hands the handler a clone of the typed payload;
/// - [`on_event`](Self::on_event) hands it the whole [`Event`] wrapper when
///   the handler needs stream metadata (ids, sequence number, timestamp).
///
/// Events with no registered handler are ignored: processors subscribe to
/// the full stream and pick what to react to.
pub struct EventRoutes<P: ?Sized> {
    entries: HashMap<TypeId, EventEntry<P>>,
}

impl<P: Send + Sync + ?Sized + 'static> EventRoutes<P> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a payload-form handler for events carrying a `T`.
    pub fn on<T, F>(&mut self, handler: F)
    where
        T: EventPayload + Clone,
        F: for<'a> HandlerFn<'a, P, T, Output = FrameworkResult<()>>,
    {
        let handler = Arc::new(handler);
        let entry = EventEntry {
            payload_name: type_name::<T>(),
            wants_wrapper: false,
            invoke: Box::new(move |processor, event| {
                let payload = event.payload::<T>().cloned();
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    match payload {
                        Some(payload) => handler.invoke(processor, payload).await,
                        None => Ok(()),
                    }
                })
            }),
        };
        self.insert::<T>(entry);
    }

    /// Register a wrapper-form handler for events carrying a `T`. The
    /// handler receives the full event; the payload type is still the
    /// dispatch key.
    pub fn on_event<T, F>(&mut self, handler: F)
    where
        T: EventPayload,
        F: for<'a> HandlerFn<'a, P, Event, Output = FrameworkResult<()>>,
    {
        let handler = Arc::new(handler);
        let entry = EventEntry {
            payload_name: type_name::<T>(),
            wants_wrapper: true,
            invoke: Box::new(move |processor, event| {
                let event = event.clone();
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler.invoke(processor, event).await })
            }),
        };
        self.insert::<T>(entry);
    }

    fn insert<T: EventPayload>(&mut self, entry: EventEntry<P>) {
        if self.entries.insert(TypeId::of::<T>(), entry).is_some() {
            panic!(
                "event handler for {} registered twice on {}",
                type_name::<T>(),
                type_name::<P>()
            );
        }
    }

    /// Route an event to its handler; unregistered payload types are
    /// silently ignored.
    pub async fn dispatch(&self, processor: &P, event: &Event) -> FrameworkResult<()> {
        match self.entries.get(&event.payload_type_id()) {
            Some(entry) => (entry.invoke)(processor, event).await,
            None => Ok(()),
        }
    }

    pub fn handles(&self, type_id: TypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    pub fn wants_wrapper(&self, type_id: TypeId) -> Option<bool> {
        self.entries.get(&type_id).map(|e| e.wants_wrapper)
    }

    pub fn handled_payloads(&self) -> Vec<&'static str> {
        self.entries.values().map(|e| e.payload_name).collect()
    }
}

impl<P: Send + Sync + ?Sized + 'static> Default for EventRoutes<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Query routing (projections)
// ================================

type ErasedQueryHandler<P> = Box<
    dyn for<'a, 'b> Fn(&'a P, &'b QueryEnvelope) -> BoxFuture<'a, FrameworkResult<QueryValue>>
        + Send
        + Sync,
>;

struct QueryEntry<P: ?Sized> {
    query_name: &'static str,
    invoke: ErasedQueryHandler<P>,
}

/// Dispatch table routing queries to a projection's async handlers. An
/// unknown query type is a programming error and raises.
pub struct QueryRoutes<P: ?Sized> {
    entries: HashMap<TypeId, QueryEntry<P>>,
}

impl<P: Send + Sync + ?Sized + 'static> QueryRoutes<P> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler for query type `Q`; the result is erased for the
    /// middleware chain and downcast back at the typed dispatch surface.
    pub fn on<Q, F>(&mut self, handler: F)
    where
        Q: Query + Clone,
        F: for<'a> HandlerFn<'a, P, Q, Output = FrameworkResult<Q::Response>>,
    {
        let handler = Arc::new(handler);
        let entry = QueryEntry {
            query_name: type_name::<Q>(),
            invoke: Box::new(move |projection, envelope| {
                let query = envelope.payload::<Q>().cloned();
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    match query {
                        Some(query) => handler
                            .invoke(projection, query)
                            .await
                            .map(|response| Box::new(response) as QueryValue),
                        None => Err(FrameworkError::no_handler_for::<Q>("query handler")),
                    }
                })
            }),
        };
        if self.entries.insert(TypeId::of::<Q>(), entry).is_some() {
            panic!(
                "query handler for {} registered twice on {}",
                type_name::<Q>(),
                type_name::<P>()
            );
        }
    }

    pub async fn dispatch(
        &self,
        projection: &P,
        envelope: &QueryEnvelope,
    ) -> FrameworkResult<QueryValue> {
        match self.entries.get(&envelope.type_id()) {
            Some(entry) => (entry.invoke)(projection, envelope).await,
            None => Err(FrameworkError::NoHandler {
                operation: "query handler",
                message_type: envelope.query_name().to_string(),
            }),
        }
    }

    pub fn handled_queries(&self) -> Vec<(TypeId, &'static str)> {
        self.entries
            .iter()
            .map(|(type_id, entry)| (*type_id, entry.query_name))
            .collect()
    }
}

impl<P: Send + Sync + ?Sized + 'static> Default for QueryRoutes<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ================================
// Middleware interceptor routing
// ================================

/// Adapter trait for per-command-type interceptor methods, mirroring
/// [`HandlerFn`] with the continuation handle as a third argument.
pub trait InterceptFn<'a, M: ?Sized>: Send + Sync + 'static {
    type Future: Future<Output = FrameworkResult<DispatchOutcome>> + Send + 'a;

    fn invoke(&self, middleware: &'a M, command: CommandEnvelope, next: Next<'a>) -> Self::Future;
}

impl<'a, M, F, Fut> InterceptFn<'a, M> for F
where
    M: ?Sized + 'a,
    F: Fn(&'a M, CommandEnvelope, Next<'a>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FrameworkResult<DispatchOutcome>> + Send + 'a,
{
    type Future = Fut;

    fn invoke(&self, middleware: &'a M, command: CommandEnvelope, next: Next<'a>) -> Fut {
        self(middleware, command, next)
    }
}

type ErasedIntercept<M> = Box<
    dyn for<'a> Fn(
            &'a M,
            CommandEnvelope,
            Next<'a>,
        ) -> BoxFuture<'a, FrameworkResult<DispatchOutcome>>
        + Send
        + Sync,
>;

struct InterceptEntry<M: ?Sized> {
    command_name: &'static str,
    invoke: ErasedIntercept<M>,
}

/// Dispatch table for middleware that intercepts specific command types.
///
/// Commands with no registered interceptor pass through to the next
/// handler unchanged ("ignore" means "forward").
pub struct InterceptRoutes<M: ?Sized> {
    entries: HashMap<TypeId, InterceptEntry<M>>,
}

impl<M: Send + Sync + ?Sized + 'static> InterceptRoutes<M> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an interceptor for command type `C`.
    pub fn on<C, F>(&mut self, handler: F)
    where
        C: Command,
        F: for<'a> InterceptFn<'a, M>,
    {
        let handler = Arc::new(handler);
        let entry = InterceptEntry {
            command_name: type_name::<C>(),
            invoke: Box::new(move |middleware, command, next| {
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler.invoke(middleware, command, next).await })
            }),
        };
        if self.entries.insert(TypeId::of::<C>(), entry).is_some() {
            panic!(
                "interceptor for {} registered twice on {}",
                type_name::<C>(),
                type_name::<M>()
            );
        }
    }

    /// Route the command to its interceptor, or forward to `next` when no
    /// interceptor matches its type.
    pub async fn dispatch(
        &self,
        middleware: &M,
        command: CommandEnvelope,
        next: Next<'_>,
    ) -> FrameworkResult<DispatchOutcome> {
        match self.entries.get(&command.type_id()) {
            Some(entry) => (entry.invoke)(middleware, command, next).await,
            None => next.run(command).await,
        }
    }

    pub fn intercepted_commands(&self) -> Vec<&'static str> {
        self.entries.values().map(|e| e.command_name).collect()
    }
}

impl<M: Send + Sync + ?Sized + 'static> Default for InterceptRoutes<M> {
    fn default() -> Self {
        Self::new()
    }
}
