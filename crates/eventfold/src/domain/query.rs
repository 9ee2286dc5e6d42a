// File: src/domain/query.rs
//
// Query trait for the read side of CQRS

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::new_id;

/// A request for data, dispatched to a projection.
///
/// Unlike commands, queries do not mutate state and return a typed result
/// declared by the `Response` associated type. The query bus downcasts the
/// projection's answer back to `Response` at the typed dispatch surface.
pub trait Query: Any + Send + Sync + fmt::Debug {
    type Response: Send + 'static;
}

/// Type-erased query result moving through the query middleware chain.
pub type QueryValue = Box<dyn Any + Send>;

/// A query captured for dispatch with a fresh `query_id`.
#[derive(Debug, Clone)]
pub struct QueryEnvelope {
    query_id: Uuid,
    query_name: &'static str,
    type_id: TypeId,
    payload: Arc<dyn Any + Send + Sync>,
}

impl QueryEnvelope {
    pub fn new<Q: Query>(query: Q) -> Self {
        Self {
            query_id: new_id(),
            query_name: type_name::<Q>(),
            type_id: TypeId::of::<Q>(),
            payload: Arc::new(query),
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn query_name(&self) -> &'static str {
        self.query_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn payload<Q: Query>(&self) -> Option<&Q> {
        self.payload.downcast_ref::<Q>()
    }
}
