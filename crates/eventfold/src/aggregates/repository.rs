// File: src/aggregates/repository.rs
//
// Per-aggregate-type load/save lifecycle: cache + snapshot + event replay,
// commit-or-discard scoping, optimistic-concurrency save

use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::commands::bus::CommandTarget;
use crate::domain::{utc_now, Aggregate, AggregateCell, CommandEnvelope};
use crate::error::FrameworkResult;
use crate::events::EventBus;
use crate::routing::AggregateRoutes;

use super::config::RepositoryConfig;
use super::snapshot::SnapshotRecord;

/// Repository owning the load/save lifecycle for one aggregate type.
///
/// Loading goes cache → snapshot → event replay; saving publishes the
/// uncommitted events through the event bus under the optimistic lock,
/// then updates cache and snapshot according to the configured strategies.
///
/// Two concurrent scopes for the same aggregate id never observe each
/// other's uncommitted mutations: each loads its own instance, and the
/// event store's `expected_version` check rejects the second writer.
/// Callers should combine this with the concurrency-retry middleware.
pub struct AggregateRepository<A: Aggregate> {
    event_bus: Arc<EventBus>,
    routes: Arc<AggregateRoutes<A>>,
    config: RepositoryConfig,
}

impl<A: Aggregate> AggregateRepository<A> {
    pub fn new(event_bus: Arc<EventBus>, config: RepositoryConfig) -> Self {
        let mut routes = AggregateRoutes::new();
        A::configure(&mut routes);
        Self {
            event_bus,
            routes: Arc::new(routes),
            config,
        }
    }

    /// The command types this aggregate's routes handle, used to build the
    /// command bus dispatch table.
    pub fn command_types(&self) -> Vec<(TypeId, &'static str)> {
        self.routes.command_types()
    }

    /// Load the aggregate at its current version (read-only path).
    pub async fn load(&self, aggregate_id: Uuid) -> FrameworkResult<A> {
        self.load_state(aggregate_id, None).await
    }

    /// Load the aggregate as of a specific version, served from a
    /// versioned snapshot plus replay when available.
    pub async fn load_at(&self, aggregate_id: Uuid, version: u64) -> FrameworkResult<A> {
        self.load_state(aggregate_id, Some(version)).await
    }

    /// All aggregate ids of this type known to the snapshot backend.
    pub async fn list_all_ids(&self) -> FrameworkResult<Vec<Uuid>> {
        self.config
            .snapshot_backend
            .list_aggregate_ids_by_type(A::aggregate_type())
            .await
    }

    /// Acquire the aggregate for the duration of `f` with save-or-discard
    /// semantics.
    ///
    /// When `f` returns `Ok`, any uncommitted events are published with
    /// `expected_version` set to the version before `f` ran, then the
    /// cache and snapshot are updated per strategy. When `f` fails, the
    /// uncommitted events are discarded and no side effects occur.
    pub async fn with_aggregate<R, F>(&self, aggregate_id: Uuid, f: F) -> FrameworkResult<R>
    where
        F: for<'a, 'b> FnOnce(&'a mut AggregateCell<'b, A>) -> FrameworkResult<R> + Send,
    {
        let mut aggregate = self.load_state(aggregate_id, None).await?;
        let version_before = aggregate.root().version;

        let outcome = {
            let routes = self.routes.as_ref();
            let mut cell = AggregateCell::new(&mut aggregate, routes);
            f(&mut cell)
        };

        let value = outcome?;

        let uncommitted = aggregate.root_mut().take_uncommitted();
        if uncommitted.is_empty() {
            return Ok(value);
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = A::aggregate_type(),
            events = uncommitted.len(),
            expected_version = version_before,
            "publishing uncommitted events"
        );
        if let Err(error) = self
            .event_bus
            .publish_events(&uncommitted, version_before)
            .await
        {
            if error.is_concurrency_conflict() {
                // The cached instance lost the race; drop it so a retry
                // reloads from the store.
                self.config.cache_backend.remove(aggregate_id).await;
            }
            return Err(error);
        }

        if self.config.cache_strategy.should_cache() {
            self.config
                .cache_backend
                .put(aggregate_id, Box::new(aggregate.clone()))
                .await;
        }

        if self.config.snapshot_strategy.should_snapshot(aggregate.root()) {
            let record = SnapshotRecord {
                aggregate_id,
                aggregate_type: A::aggregate_type().to_string(),
                version: aggregate.root().version,
                state: serde_json::to_value(&aggregate)?,
                taken_at: utc_now(),
            };
            self.config.snapshot_backend.save_snapshot(record).await?;
            aggregate.root_mut().mark_snapshot();
        }

        Ok(value)
    }

    async fn load_state(
        &self,
        aggregate_id: Uuid,
        intended_version: Option<u64>,
    ) -> FrameworkResult<A> {
        if intended_version.is_none() && self.config.cache_strategy.should_cache() {
            if let Some(boxed) = self.config.cache_backend.get(aggregate_id).await {
                if let Ok(cached) = boxed.downcast::<A>() {
                    let aggregate = *cached;
                    // Keep the backend warm for the next acquire.
                    self.config
                        .cache_backend
                        .put(aggregate_id, Box::new(aggregate.clone()))
                        .await;
                    tracing::debug!(
                        aggregate_id = %aggregate_id,
                        aggregate_type = A::aggregate_type(),
                        "aggregate served from cache"
                    );
                    return Ok(aggregate);
                }
            }
        }

        let snapshot = self
            .config
            .snapshot_backend
            .load_snapshot(aggregate_id, intended_version)
            .await?;

        let (mut aggregate, min_version) = match snapshot {
            Some(record) => {
                let mut restored: A = serde_json::from_value(record.state)?;
                let root = restored.root_mut();
                root.id = aggregate_id;
                root.version = record.version;
                root.clear_uncommitted();
                (restored, record.version + 1)
            }
            None => (A::new(aggregate_id), 0),
        };

        let events = self.event_bus.load_events(aggregate_id, min_version).await?;
        for event in &events {
            if let Some(limit) = intended_version {
                if event.sequence_number > limit {
                    break;
                }
            }
            self.routes
                .dispatch_apply(&mut aggregate, event.data().as_ref());
            let root = aggregate.root_mut();
            root.version = event.sequence_number;
            root.last_event_time = event.timestamp;
        }

        Ok(aggregate)
    }
}

#[async_trait]
impl<A: Aggregate> CommandTarget for AggregateRepository<A> {
    async fn execute(&self, command: &CommandEnvelope) -> FrameworkResult<()> {
        self.with_aggregate(command.aggregate_id(), |cell| cell.handle(command))
            .await
    }
}
