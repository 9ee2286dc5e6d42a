// File: src/events/bus.rs
//
// Event bus: coordinates upcast -> persist -> deliver on publish, and
// load -> upcast (-> rewrite) on read

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::Event;
use crate::error::FrameworkResult;
use crate::events::delivery::EventDelivery;
use crate::events::store::EventStore;
use crate::events::transport::EventSubscription;
use crate::events::upcasting::UpcastingPipeline;

/// Entry point for publishing and loading events.
///
/// Publishing flows write-upcast (per strategy) → optimistic-lock save →
/// delivery. Loading flows store → read-upcast; under an eager strategy,
/// events whose payload changed during upcasting are rewritten back to the
/// store so subsequent reads are free of upcast work.
pub struct EventBus {
    store: Arc<dyn EventStore>,
    delivery: Arc<dyn EventDelivery>,
    upcasting_pipeline: Arc<UpcastingPipeline>,
}

impl EventBus {
    pub fn new(
        store: Arc<dyn EventStore>,
        delivery: Arc<dyn EventDelivery>,
        upcasting_pipeline: Arc<UpcastingPipeline>,
    ) -> Self {
        Self {
            store,
            delivery,
            upcasting_pipeline,
        }
    }

    /// Publish events: upcast for write, persist with the optimistic lock,
    /// deliver.
    ///
    /// `expected_version` is the aggregate version before these events;
    /// a mismatch in the store raises a concurrency conflict and nothing
    /// is delivered.
    pub async fn publish_events(
        &self,
        events: &[Event],
        expected_version: u64,
    ) -> FrameworkResult<()> {
        let upcasted = self.upcasting_pipeline.write_upcast(events.to_vec())?;
        self.store.save_events(&upcasted, expected_version).await?;
        self.delivery.deliver(&upcasted).await
    }

    /// Load events with schema evolution applied.
    pub async fn load_events(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
    ) -> FrameworkResult<Vec<Event>> {
        let loaded = self.store.load_events(aggregate_id, min_version).await?;
        let upcasted = self.upcasting_pipeline.read_upcast(loaded.clone())?;

        if self.upcasting_pipeline.strategy().rewrite_on_load() {
            let changed: Vec<Event> = loaded
                .iter()
                .zip(upcasted.iter())
                .filter(|(before, after)| before.payload_type_id() != after.payload_type_id())
                .map(|(_, after)| after.clone())
                .collect();
            if !changed.is_empty() {
                tracing::info!(
                    aggregate_id = %aggregate_id,
                    rewritten = changed.len(),
                    "rewriting upcasted events for gradual migration"
                );
                self.store.rewrite_events(&changed).await?;
            }
        }

        Ok(upcasted)
    }

    /// Subscribe to the live event stream via the delivery strategy.
    pub async fn subscribe(&self, identifier: &str) -> FrameworkResult<Box<dyn EventSubscription>> {
        self.delivery.subscribe(identifier).await
    }
}
