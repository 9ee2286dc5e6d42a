// File: src/aggregates/snapshot.rs
//
// Snapshot storage backends and the strategy deciding when to snapshot

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{utc_now, AggregateRoot};
use crate::error::FrameworkResult;

/// Serialized aggregate state at a point in its stream.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub aggregate_id: Uuid,
    /// Qualified aggregate type name, for listing ids by type.
    pub aggregate_type: String,
    /// Aggregate version the state corresponds to.
    pub version: u64,
    pub state: Value,
    pub taken_at: DateTime<Utc>,
}

/// Persisted aggregate states.
///
/// Two storage modes exist: *single* keeps at most one snapshot per
/// aggregate (save overwrites), *versioned* appends and load picks the
/// latest with `version <= intended_version` (or the latest outright).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> FrameworkResult<()>;

    async fn load_snapshot(
        &self,
        aggregate_id: Uuid,
        intended_version: Option<u64>,
    ) -> FrameworkResult<Option<SnapshotRecord>>;

    /// All aggregate ids of a type that have at least one snapshot. Feeds
    /// snapshot-based catchup.
    async fn list_aggregate_ids_by_type(&self, aggregate_type: &str)
        -> FrameworkResult<Vec<Uuid>>;
}

/// Snapshot storage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    /// One snapshot per aggregate; saving overwrites.
    Single,
    /// Append-only history; loads filter by intended version.
    Versioned,
}

/// No-op backend: nothing is stored, loads miss, listings are empty.
pub struct NullSnapshotStore;

#[async_trait]
impl SnapshotStore for NullSnapshotStore {
    async fn save_snapshot(&self, _snapshot: SnapshotRecord) -> FrameworkResult<()> {
        Ok(())
    }

    async fn load_snapshot(
        &self,
        _aggregate_id: Uuid,
        _intended_version: Option<u64>,
    ) -> FrameworkResult<Option<SnapshotRecord>> {
        Ok(None)
    }

    async fn list_aggregate_ids_by_type(
        &self,
        _aggregate_type: &str,
    ) -> FrameworkResult<Vec<Uuid>> {
        Ok(Vec::new())
    }
}

/// In-memory snapshot storage supporting both modes.
pub struct InMemorySnapshotStore {
    mode: SnapshotMode,
    snapshots: RwLock<HashMap<Uuid, Vec<SnapshotRecord>>>,
}

impl InMemorySnapshotStore {
    pub fn new(mode: SnapshotMode) -> Self {
        Self {
            mode,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn single() -> Self {
        Self::new(SnapshotMode::Single)
    }

    pub fn versioned() -> Self {
        Self::new(SnapshotMode::Versioned)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> FrameworkResult<()> {
        let mut snapshots = self.snapshots.write().await;
        let entry = snapshots.entry(snapshot.aggregate_id).or_default();
        match self.mode {
            SnapshotMode::Single => {
                entry.clear();
                entry.push(snapshot);
            }
            SnapshotMode::Versioned => {
                entry.push(snapshot);
                entry.sort_by_key(|s| s.version);
            }
        }
        Ok(())
    }

    async fn load_snapshot(
        &self,
        aggregate_id: Uuid,
        intended_version: Option<u64>,
    ) -> FrameworkResult<Option<SnapshotRecord>> {
        let snapshots = self.snapshots.read().await;
        let Some(entry) = snapshots.get(&aggregate_id) else {
            return Ok(None);
        };

        let found = match intended_version {
            None => entry.last(),
            Some(intended) => entry.iter().rev().find(|s| s.version <= intended),
        };
        Ok(found.cloned())
    }

    async fn list_aggregate_ids_by_type(
        &self,
        aggregate_type: &str,
    ) -> FrameworkResult<Vec<Uuid>> {
        let snapshots = self.snapshots.read().await;
        let mut ids: Vec<Uuid> = snapshots
            .iter()
            .filter(|(_, records)| {
                records
                    .last()
                    .is_some_and(|r| r.aggregate_type == aggregate_type)
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// When a repository snapshots a committed aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStrategy {
    Never,
    /// Snapshot whenever the version is a multiple of `n`.
    EveryNEvents(u64),
    /// Snapshot when the last snapshot is older than the given age.
    AfterAge(Duration),
}

impl SnapshotStrategy {
    pub fn should_snapshot(&self, root: &AggregateRoot) -> bool {
        match self {
            SnapshotStrategy::Never => false,
            SnapshotStrategy::EveryNEvents(n) => *n > 0 && root.version % n == 0,
            SnapshotStrategy::AfterAge(age) => utc_now() - root.last_snapshot_time >= *age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_id;
    use serde_json::json;

    fn record(aggregate_id: Uuid, version: u64) -> SnapshotRecord {
        SnapshotRecord {
            aggregate_id,
            aggregate_type: "counter".into(),
            version,
            state: json!({ "count": version }),
            taken_at: utc_now(),
        }
    }

    #[tokio::test]
    async fn single_mode_overwrites() {
        let store = InMemorySnapshotStore::single();
        let id = new_id();
        store.save_snapshot(record(id, 5)).await.unwrap();
        store.save_snapshot(record(id, 10)).await.unwrap();

        let loaded = store.load_snapshot(id, None).await.unwrap().unwrap();
        assert_eq!(loaded.version, 10);
        // Single mode keeps no history: an older intended version misses.
        assert!(store.load_snapshot(id, Some(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn versioned_mode_picks_latest_at_or_below_intended() {
        let store = InMemorySnapshotStore::versioned();
        let id = new_id();
        store.save_snapshot(record(id, 5)).await.unwrap();
        store.save_snapshot(record(id, 10)).await.unwrap();
        store.save_snapshot(record(id, 15)).await.unwrap();

        assert_eq!(
            store.load_snapshot(id, None).await.unwrap().unwrap().version,
            15
        );
        assert_eq!(
            store
                .load_snapshot(id, Some(12))
                .await
                .unwrap()
                .unwrap()
                .version,
            10
        );
        assert!(store.load_snapshot(id, Some(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_filters_by_aggregate_type() {
        let store = InMemorySnapshotStore::single();
        let counter_id = new_id();
        store.save_snapshot(record(counter_id, 1)).await.unwrap();

        let other_id = new_id();
        store
            .save_snapshot(SnapshotRecord {
                aggregate_type: "order".into(),
                ..record(other_id, 1)
            })
            .await
            .unwrap();

        assert_eq!(
            store.list_aggregate_ids_by_type("counter").await.unwrap(),
            vec![counter_id]
        );
    }

    #[test]
    fn snapshot_strategy_every_n() {
        let mut root = AggregateRoot::new(new_id());
        assert!(!SnapshotStrategy::EveryNEvents(5).should_snapshot(&root));
        root.version = 10;
        assert!(SnapshotStrategy::EveryNEvents(5).should_snapshot(&root));
        root.version = 11;
        assert!(!SnapshotStrategy::EveryNEvents(5).should_snapshot(&root));
        assert!(!SnapshotStrategy::Never.should_snapshot(&root));
    }

    #[test]
    fn snapshot_strategy_after_age() {
        let mut root = AggregateRoot::new(new_id());
        root.last_snapshot_time = utc_now() - Duration::minutes(10);
        assert!(SnapshotStrategy::AfterAge(Duration::minutes(5)).should_snapshot(&root));
        assert!(!SnapshotStrategy::AfterAge(Duration::hours(1)).should_snapshot(&root));
    }
}
