// File: src/aggregates/cache.rs
//
// Pluggable aggregate instance caching for repositories

use std::any::Any;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// When a repository consults and updates its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Never cache; every acquire rebuilds from snapshot + events.
    Never,
    /// Cache every committed aggregate and serve hits on acquire.
    Always,
}

impl CacheStrategy {
    pub fn should_cache(&self) -> bool {
        matches!(self, CacheStrategy::Always)
    }
}

/// Storage backend for cached aggregate instances.
///
/// Values are type-erased clones of live aggregates; the repository owns
/// the downcast. Each aggregate type gets its own backend instance via its
/// repository configuration.
#[async_trait]
pub trait AggregateCache: Send + Sync {
    async fn get(&self, aggregate_id: Uuid) -> Option<Box<dyn Any + Send + Sync>>;

    async fn put(&self, aggregate_id: Uuid, aggregate: Box<dyn Any + Send + Sync>);

    async fn remove(&self, aggregate_id: Uuid);
}

/// No-op cache backend: never hits, never stores.
pub struct NullAggregateCache;

#[async_trait]
impl AggregateCache for NullAggregateCache {
    async fn get(&self, _aggregate_id: Uuid) -> Option<Box<dyn Any + Send + Sync>> {
        None
    }

    async fn put(&self, _aggregate_id: Uuid, _aggregate: Box<dyn Any + Send + Sync>) {}

    async fn remove(&self, _aggregate_id: Uuid) {}
}

/// Unbounded in-memory cache keyed by aggregate id.
pub struct InMemoryAggregateCache {
    entries: RwLock<HashMap<Uuid, Box<dyn Any + Send + Sync>>>,
}

impl InMemoryAggregateCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAggregateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AggregateCache for InMemoryAggregateCache {
    async fn get(&self, aggregate_id: Uuid) -> Option<Box<dyn Any + Send + Sync>> {
        // Boxed values cannot be cloned without the concrete type, so the
        // map is read-and-removed; the repository re-inserts on commit.
        self.entries.write().await.remove(&aggregate_id)
    }

    async fn put(&self, aggregate_id: Uuid, aggregate: Box<dyn Any + Send + Sync>) {
        self.entries.write().await.insert(aggregate_id, aggregate);
    }

    async fn remove(&self, aggregate_id: Uuid) {
        self.entries.write().await.remove(&aggregate_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_id;

    #[tokio::test]
    async fn null_cache_never_hits() {
        let cache = NullAggregateCache;
        let id = new_id();
        cache.put(id, Box::new(42u64)).await;
        assert!(cache.get(id).await.is_none());
    }

    #[tokio::test]
    async fn in_memory_cache_stores_and_takes() {
        let cache = InMemoryAggregateCache::new();
        let id = new_id();
        cache.put(id, Box::new(42u64)).await;

        let value = cache.get(id).await.unwrap();
        assert_eq!(*value.downcast::<u64>().unwrap(), 42);
        // Taken on read; a second get misses until re-put.
        assert!(cache.get(id).await.is_none());
    }
}
