// File: src/processing/strategies.rs
//
// Catchup strategies: how a processor re-synchronizes with event history

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::aggregates::AggregateRepository;
use crate::domain::{Aggregate, Event};
use crate::error::FrameworkResult;
use crate::events::transport::EventTransport;

use super::checkpoint::{Checkpoint, CheckpointBackend};
use super::processor::EventProcessor;
use super::projectors::AggregateProjector;

/// Number of aggregates between checkpoint saves during snapshot catchup.
const CHECKPOINT_EVERY: usize = 100;

/// Result of a catchup operation: an optional skip window.
///
/// Events the catchup already incorporated must not be dispatched again
/// when the executor resumes from the subscription; the window marks them
/// by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchupResult {
    /// Events with `timestamp <= skip_before` are skipped. `None` skips
    /// nothing.
    pub skip_before: Option<DateTime<Utc>>,
}

impl CatchupResult {
    pub fn skip_before(timestamp: DateTime<Utc>) -> Self {
        Self {
            skip_before: Some(timestamp),
        }
    }

    pub fn should_skip(&self, event: &Event) -> bool {
        match self.skip_before {
            Some(boundary) => event.timestamp <= boundary,
            None => false,
        }
    }
}

/// Strategy for bringing a processor in sync with event history.
///
/// Invoked once at executor startup and again whenever the catchup
/// condition fires.
#[async_trait]
pub trait CatchupStrategy: Send + Sync {
    /// Whether event processing pauses while catchup runs.
    fn is_blocking(&self) -> bool;

    /// Synchronize the processor. Returns a skip window when historical
    /// events were incorporated, `None` otherwise.
    async fn catchup(
        &self,
        processor: &dyn EventProcessor,
    ) -> FrameworkResult<Option<CatchupResult>>;
}

/// No catchup: the processor starts from its current position and only
/// sees new events.
pub struct NoCatchup;

#[async_trait]
impl CatchupStrategy for NoCatchup {
    fn is_blocking(&self) -> bool {
        false
    }

    async fn catchup(
        &self,
        _processor: &dyn EventProcessor,
    ) -> FrameworkResult<Option<CatchupResult>> {
        Ok(None)
    }
}

/// Replay the transport's full history through the processor.
///
/// Simple and correct; cost grows with history size, so it suits small to
/// medium stores and development setups.
pub struct ReplayAllEvents {
    transport: Arc<dyn EventTransport>,
}

impl ReplayAllEvents {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl CatchupStrategy for ReplayAllEvents {
    fn is_blocking(&self) -> bool {
        true
    }

    async fn catchup(
        &self,
        processor: &dyn EventProcessor,
    ) -> FrameworkResult<Option<CatchupResult>> {
        let mut subscription = self.transport.subscribe("all").await?;
        let backlog = subscription.depth().await;
        tracing::info!(
            processor = processor.name(),
            backlog,
            "replaying event history"
        );
        for _ in 0..backlog {
            let event = subscription.next().await?;
            processor.handle(&event).await?;
        }
        Ok(None)
    }
}

/// Resumable catchup from aggregate snapshots.
///
/// Loads every aggregate of type `A` (snapshot + events), projects its
/// current state into the processor, and checkpoints progress every
/// hundred aggregates so a crash resumes instead of restarting. Returns a
/// skip window at the newest event timestamp incorporated, so the executor
/// does not double-process those events from the subscription.
pub struct FromAggregateSnapshot<A: Aggregate> {
    repository: Arc<AggregateRepository<A>>,
    projector: Arc<dyn AggregateProjector<A>>,
    checkpoint_backend: Arc<dyn CheckpointBackend>,
}

impl<A: Aggregate> FromAggregateSnapshot<A> {
    pub fn new(
        repository: Arc<AggregateRepository<A>>,
        projector: Arc<dyn AggregateProjector<A>>,
        checkpoint_backend: Arc<dyn CheckpointBackend>,
    ) -> Self {
        Self {
            repository,
            projector,
            checkpoint_backend,
        }
    }
}

#[async_trait]
impl<A: Aggregate> CatchupStrategy for FromAggregateSnapshot<A> {
    fn is_blocking(&self) -> bool {
        true
    }

    async fn catchup(
        &self,
        processor: &dyn EventProcessor,
    ) -> FrameworkResult<Option<CatchupResult>> {
        let name = processor.name();
        let mut checkpoint = self
            .checkpoint_backend
            .load_checkpoint(name)
            .await?
            .unwrap_or_else(|| Checkpoint::new(name));

        let all_ids = self.repository.list_all_ids().await?;
        let remaining: Vec<_> = all_ids
            .into_iter()
            .filter(|id| !checkpoint.processed_aggregate_ids.contains(id))
            .collect();

        tracing::info!(
            processor = name,
            aggregate_type = A::aggregate_type(),
            remaining = remaining.len(),
            already_processed = checkpoint.processed_aggregate_ids.len(),
            "catching up from aggregate snapshots"
        );

        for aggregate_id in remaining {
            let aggregate = self.repository.load(aggregate_id).await?;
            self.projector.project(&aggregate, processor).await?;

            let root = aggregate.root();
            if root.last_event_time > checkpoint.max_timestamp {
                checkpoint.max_timestamp = root.last_event_time;
            }
            checkpoint.processed_aggregate_ids.insert(aggregate_id);
            checkpoint.events_processed += root.version;

            if checkpoint.processed_aggregate_ids.len() % CHECKPOINT_EVERY == 0 {
                self.checkpoint_backend.save_checkpoint(&checkpoint).await?;
            }
        }

        self.checkpoint_backend.save_checkpoint(&checkpoint).await?;

        Ok(Some(CatchupResult::skip_before(checkpoint.max_timestamp)))
    }
}
