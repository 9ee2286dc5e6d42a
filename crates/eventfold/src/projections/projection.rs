// File: src/projections/projection.rs
//
// Projection: an event processor that additionally serves typed queries

use async_trait::async_trait;
use std::any::TypeId;

use crate::domain::{QueryEnvelope, QueryValue};
use crate::error::FrameworkResult;
use crate::processing::EventProcessor;

/// Read model combining event handling with query handling.
///
/// Projections consume events to maintain denormalized in-memory state and
/// answer queries from it synchronously. Implementations hold an
/// [`EventRoutes`](crate::routing::EventRoutes) and a
/// [`QueryRoutes`](crate::routing::QueryRoutes) built at construction:
///
/// ```ignore
/// struct AccountBalances {
///     balances: RwLock<HashMap<Uuid, i64>>,
///     events: EventRoutes<Self>,
///     queries: QueryRoutes<Self>,
/// }
///
/// impl AccountBalances {
///     fn new() -> Self {
///         let mut events = EventRoutes::new();
///         events.on_event::<MoneyDeposited, _>(Self::on_deposited);
///         let mut queries = QueryRoutes::new();
///         queries.on(Self::get_balance);
///         Self { balances: RwLock::default(), events, queries }
///     }
/// }
/// ```
///
/// Queries may run concurrently with event handling; projections guard
/// their state with interior mutability (`RwLock` in the common case).
#[async_trait]
pub trait Projection: EventProcessor {
    /// Answer a query from the projection's materialized state.
    async fn query(&self, query: &QueryEnvelope) -> FrameworkResult<QueryValue>;

    /// The query types this projection answers, used to build the query
    /// bus dispatch table.
    fn handled_queries(&self) -> Vec<(TypeId, &'static str)>;
}
