// File: src/aggregates/mod.rs
//
// Aggregate persistence: repositories, caching, snapshots, configuration

pub mod cache;
pub mod config;
pub mod repository;
pub mod snapshot;

pub use cache::{AggregateCache, CacheStrategy, InMemoryAggregateCache, NullAggregateCache};
pub use config::{RepositoryConfig, RepositoryConfigRegistry};
pub use repository::AggregateRepository;
pub use snapshot::{
    InMemorySnapshotStore, NullSnapshotStore, SnapshotMode, SnapshotRecord, SnapshotStore,
    SnapshotStrategy,
};
