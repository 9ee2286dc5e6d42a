// File: src/projections/bus.rs
//
// Query bus: middleware chain over delegate-to-projection dispatch

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Query, QueryEnvelope, QueryValue};
use crate::error::{FrameworkError, FrameworkResult};
use crate::routing::BoxFuture;

use super::projection::Projection;

/// Middleware wrapping query dispatch. Middleware may observe the query,
/// transform the (type-erased) result, or short-circuit without reaching
/// the projection.
#[async_trait]
pub trait QueryMiddleware: Send + Sync {
    async fn intercept(
        &self,
        query: QueryEnvelope,
        next: QueryNext<'_>,
    ) -> FrameworkResult<QueryValue>;
}

/// Continuation handle for the rest of the query middleware chain.
#[derive(Clone, Copy)]
pub struct QueryNext<'a> {
    bus: &'a QueryBus,
    index: usize,
}

impl<'a> QueryNext<'a> {
    pub async fn run(self, query: QueryEnvelope) -> FrameworkResult<QueryValue> {
        self.bus.invoke(self.index, query).await
    }
}

/// Routes queries through middleware to the projection that answers them.
///
/// Mirrors the command bus; unlike commands, queries return typed results,
/// recovered by downcast at [`dispatch`](Self::dispatch).
pub struct QueryBus {
    middleware: Vec<Arc<dyn QueryMiddleware>>,
    projections: HashMap<TypeId, Arc<dyn Projection>>,
}

impl QueryBus {
    pub fn new(
        middleware: Vec<Arc<dyn QueryMiddleware>>,
        projections: Vec<Arc<dyn Projection>>,
    ) -> FrameworkResult<Self> {
        let mut by_query: HashMap<TypeId, Arc<dyn Projection>> = HashMap::new();
        for projection in projections {
            for (query_type, query_name) in projection.handled_queries() {
                if by_query.insert(query_type, Arc::clone(&projection)).is_some() {
                    return Err(FrameworkError::configuration(format!(
                        "query {} is handled by more than one projection",
                        query_name
                    )));
                }
            }
        }
        Ok(Self {
            middleware,
            projections: by_query,
        })
    }

    /// Dispatch a query and downcast the answer to its declared response
    /// type.
    pub async fn dispatch<Q: Query>(&self, query: Q) -> FrameworkResult<Q::Response> {
        let envelope = QueryEnvelope::new(query);
        let value = self.invoke(0, envelope).await?;
        value
            .downcast::<Q::Response>()
            .map(|boxed| *boxed)
            .map_err(|_| FrameworkError::Serialization {
                message: format!(
                    "query {} returned a value of an unexpected type",
                    std::any::type_name::<Q>()
                ),
            })
    }

    /// Dispatch an already-enveloped query, returning the erased value.
    pub async fn dispatch_envelope(&self, envelope: QueryEnvelope) -> FrameworkResult<QueryValue> {
        self.invoke(0, envelope).await
    }

    fn invoke(
        &self,
        index: usize,
        query: QueryEnvelope,
    ) -> BoxFuture<'_, FrameworkResult<QueryValue>> {
        Box::pin(async move {
            match self.middleware.get(index) {
                Some(middleware) => {
                    let next = QueryNext {
                        bus: self,
                        index: index + 1,
                    };
                    middleware.intercept(query, next).await
                }
                None => match self.projections.get(&query.type_id()) {
                    Some(projection) => projection.query(&query).await,
                    None => Err(FrameworkError::NoHandler {
                        operation: "query handler",
                        message_type: query.query_name().to_string(),
                    }),
                },
            }
        })
    }
}
