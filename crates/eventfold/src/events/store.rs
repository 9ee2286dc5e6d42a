// File: src/events/store.rs
//
// Durable, per-aggregate ordered append log with optimistic concurrency

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Event;
use crate::error::{FrameworkError, FrameworkResult};

/// Event store interface: the durable side of the event pipeline.
///
/// `(aggregate_id, sequence_number)` is unique. Saves are atomic across the
/// events list, and implementations tolerate an empty list as a no-op.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append events for one aggregate with optimistic concurrency control.
    ///
    /// Fails with [`FrameworkError::ConcurrencyConflict`] when the
    /// aggregate's current version (max persisted sequence number, or 0)
    /// differs from `expected_version`.
    async fn save_events(&self, events: &[Event], expected_version: u64) -> FrameworkResult<()>;

    /// Load events for an aggregate with `sequence_number >= min_version`,
    /// in strictly increasing sequence order.
    async fn load_events(&self, aggregate_id: Uuid, min_version: u64)
        -> FrameworkResult<Vec<Event>>;

    /// Overwrite existing event rows in place, matched by
    /// `(aggregate_id, sequence_number)`. Identity and ordering are
    /// preserved. Used by the eager upcasting strategy for gradual schema
    /// migration.
    async fn rewrite_events(&self, events: &[Event]) -> FrameworkResult<()>;
}

/// Dictionary-based in-memory event store.
///
/// Keeps each aggregate's events in a list ordered by sequence number
/// behind a `tokio::sync::RwLock`, with the same version check a database
/// backend would enforce through a unique index. Suitable for tests and
/// single-process applications; durability comes from real backends.
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<Uuid, Vec<Event>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_events(&self, events: &[Event], expected_version: u64) -> FrameworkResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let aggregate_id = events[0].aggregate_id;
        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id).or_default();

        let current_version = stream.last().map(|e| e.sequence_number).unwrap_or(0);
        if current_version != expected_version {
            return Err(FrameworkError::concurrency(format!(
                "expected version {} for aggregate {}, got {}",
                expected_version, aggregate_id, current_version
            )));
        }

        stream.extend(events.iter().cloned());
        Ok(())
    }

    async fn load_events(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
    ) -> FrameworkResult<Vec<Event>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.sequence_number >= min_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn rewrite_events(&self, events: &[Event]) -> FrameworkResult<()> {
        let mut streams = self.streams.write().await;
        for event in events {
            if let Some(stream) = streams.get_mut(&event.aggregate_id) {
                if let Some(slot) = stream
                    .iter_mut()
                    .find(|e| e.sequence_number == event.sequence_number)
                {
                    *slot = event.clone();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_id;

    #[derive(Debug, Clone, PartialEq)]
    struct Deposited {
        amount: i64,
    }

    fn event(aggregate_id: Uuid, seq: u64, amount: i64) -> Event {
        Event::new(aggregate_id, seq, Deposited { amount })
    }

    #[tokio::test]
    async fn saves_and_loads_in_sequence_order() {
        let store = InMemoryEventStore::new();
        let id = new_id();

        store.save_events(&[event(id, 1, 10)], 0).await.unwrap();
        store
            .save_events(&[event(id, 2, 20), event(id, 3, 30)], 1)
            .await
            .unwrap();

        let events = store.load_events(id, 0).await.unwrap();
        assert_eq!(
            events.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn load_respects_min_version() {
        let store = InMemoryEventStore::new();
        let id = new_id();
        store
            .save_events(&[event(id, 1, 1), event(id, 2, 2), event(id, 3, 3)], 0)
            .await
            .unwrap();

        let events = store.load_events(id, 2).await.unwrap();
        assert_eq!(
            events.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[tokio::test]
    async fn version_mismatch_is_a_concurrency_conflict() {
        let store = InMemoryEventStore::new();
        let id = new_id();
        store.save_events(&[event(id, 1, 10)], 0).await.unwrap();

        let err = store.save_events(&[event(id, 2, 20)], 0).await.unwrap_err();
        assert!(err.is_concurrency_conflict());
    }

    #[tokio::test]
    async fn empty_save_is_a_noop() {
        let store = InMemoryEventStore::new();
        store.save_events(&[], 17).await.unwrap();
    }

    #[tokio::test]
    async fn rewrite_replaces_matched_rows_in_place() {
        let store = InMemoryEventStore::new();
        let id = new_id();
        store
            .save_events(&[event(id, 1, 10), event(id, 2, 20)], 0)
            .await
            .unwrap();

        let loaded = store.load_events(id, 0).await.unwrap();
        let rewritten = loaded[0].replace_payload(std::sync::Arc::new(Deposited { amount: 99 }));
        store.rewrite_events(&[rewritten]).await.unwrap();

        let after = store.load_events(id, 0).await.unwrap();
        assert_eq!(after[0].payload::<Deposited>().unwrap().amount, 99);
        assert_eq!(after[0].id, loaded[0].id);
        assert_eq!(after[1].payload::<Deposited>().unwrap().amount, 20);
    }
}
