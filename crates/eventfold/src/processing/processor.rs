// File: src/processing/processor.rs
//
// Event processor: the consuming side of the event pipeline

use std::any::Any;

use async_trait::async_trait;

use crate::domain::Event;
use crate::error::FrameworkResult;

/// Consumer of events: builds read models, runs side effects, or
/// coordinates sagas.
///
/// Processors subscribe to the full event stream and pick what to react
/// to; the idiomatic implementation holds an
/// [`EventRoutes`](crate::routing::EventRoutes) built at construction and
/// forwards `handle` to it:
///
/// ```ignore
/// struct Notifications {
///     routes: EventRoutes<Self>,
/// }
///
/// #[async_trait]
/// impl EventProcessor for Notifications {
///     fn name(&self) -> &'static str { "notifications" }
///     fn as_any(&self) -> &dyn Any { self }
///     async fn handle(&self, event: &Event) -> FrameworkResult<()> {
///         self.routes.dispatch(self, event).await
///     }
/// }
/// ```
///
/// State lives behind interior mutability (`RwLock`/`Mutex`): the executor
/// drives `handle` sequentially within a batch, while projections may
/// serve queries concurrently.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Stable name for this processor; keys its catchup checkpoints.
    fn name(&self) -> &'static str;

    /// Escape hatch for aggregate projectors that need the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Handle one event. Errors propagate: they fail the publish under
    /// synchronous delivery and terminate the executor loop under
    /// asynchronous delivery.
    async fn handle(&self, event: &Event) -> FrameworkResult<()>;
}
