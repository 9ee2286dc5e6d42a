// File: src/aggregates/config.rs
//
// Per-aggregate-type repository configuration with a default fallback

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Aggregate;

use super::cache::{AggregateCache, CacheStrategy, NullAggregateCache};
use super::snapshot::{NullSnapshotStore, SnapshotStore, SnapshotStrategy};

/// Caching and snapshotting behavior for one aggregate's repository.
///
/// The default disables both: safe, not optimized.
#[derive(Clone)]
pub struct RepositoryConfig {
    pub cache_backend: Arc<dyn AggregateCache>,
    pub cache_strategy: CacheStrategy,
    pub snapshot_backend: Arc<dyn SnapshotStore>,
    pub snapshot_strategy: SnapshotStrategy,
}

impl RepositoryConfig {
    pub fn with_cache(mut self, backend: Arc<dyn AggregateCache>, strategy: CacheStrategy) -> Self {
        self.cache_backend = backend;
        self.cache_strategy = strategy;
        self
    }

    pub fn with_snapshots(
        mut self,
        backend: Arc<dyn SnapshotStore>,
        strategy: SnapshotStrategy,
    ) -> Self {
        self.snapshot_backend = backend;
        self.snapshot_strategy = strategy;
        self
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_backend: Arc::new(NullAggregateCache),
            cache_strategy: CacheStrategy::Never,
            snapshot_backend: Arc::new(NullSnapshotStore),
            snapshot_strategy: SnapshotStrategy::Never,
        }
    }
}

/// Registry mapping aggregate types to repository configurations, with a
/// default used for types without an override.
#[derive(Clone, Default)]
pub struct RepositoryConfigRegistry {
    default: RepositoryConfig,
    overrides: HashMap<TypeId, RepositoryConfig>,
}

impl RepositoryConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, config: RepositoryConfig) {
        self.default = config;
    }

    pub fn register<A: Aggregate>(&mut self, config: RepositoryConfig) {
        self.overrides.insert(TypeId::of::<A>(), config);
    }

    pub fn get<A: Aggregate>(&self) -> RepositoryConfig {
        self.get_by_type_id(TypeId::of::<A>())
    }

    pub(crate) fn get_by_type_id(&self, type_id: TypeId) -> RepositoryConfig {
        self.overrides
            .get(&type_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
