// File: src/processing/executor.rs
//
// Runtime loop driving an event processor: batch, measure lag, catch up

use std::sync::Arc;

use chrono::Duration;

use crate::context::{with_context, ExecutionContext};
use crate::domain::utc_now;
use crate::error::{FrameworkError, FrameworkResult};
use crate::events::transport::EventSubscription;

use super::conditions::{CatchupCondition, Lag};
use super::processor::EventProcessor;
use super::strategies::{CatchupResult, CatchupStrategy};

/// Drives a processor against a subscription.
///
/// The loop runs the strategy's initial catchup, then forever: pull a
/// batch, dispatch each event with its causal context restored, measure
/// lag, and re-run catchup when the condition fires. A catchup's skip
/// window suppresses events it already incorporated and is cleared after
/// the first post-catchup batch.
///
/// The loop ends cleanly when the subscription signals end-of-stream,
/// propagates handler and strategy errors, and is cooperatively
/// cancellable; the per-event execution context is scoped, so it cannot
/// outlive any exit path.
pub struct EventProcessorExecutor {
    processor: Arc<dyn EventProcessor>,
    condition: CatchupCondition,
    strategy: Arc<dyn CatchupStrategy>,
    batch_size: usize,
}

impl EventProcessorExecutor {
    pub fn new(
        processor: Arc<dyn EventProcessor>,
        condition: CatchupCondition,
        strategy: Arc<dyn CatchupStrategy>,
        batch_size: usize,
    ) -> FrameworkResult<Self> {
        if batch_size == 0 {
            return Err(FrameworkError::configuration(
                "batch_size must be positive",
            ));
        }
        Ok(Self {
            processor,
            condition,
            strategy,
            batch_size,
        })
    }

    /// Run until the subscription ends or a handler fails.
    pub async fn run(&self, mut subscription: Box<dyn EventSubscription>) -> FrameworkResult<()> {
        let mut catchup_result = self.strategy.catchup(self.processor.as_ref()).await?;

        loop {
            match self
                .process_batch_and_check_catchup(subscription.as_mut(), catchup_result.take())
                .await
            {
                Ok(next_window) => catchup_result = next_window,
                Err(FrameworkError::SubscriptionClosed) => {
                    tracing::debug!(
                        processor = self.processor.name(),
                        "subscription ended, stopping executor"
                    );
                    return Ok(());
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One loop iteration: process a batch, measure lag, clear the skip
    /// window, trigger catchup when the condition is met.
    async fn process_batch_and_check_catchup(
        &self,
        subscription: &mut dyn EventSubscription,
        catchup_result: Option<CatchupResult>,
    ) -> FrameworkResult<Option<CatchupResult>> {
        let average_event_age = self
            .process_event_batch(subscription, catchup_result.as_ref())
            .await?;

        let lag = Lag {
            unprocessed_events: subscription.depth().await,
            average_event_age,
        };

        // The skip window was consumed above: one-shot after the first
        // post-catchup batch.
        if self.condition.should_catchup(&lag) {
            tracing::info!(
                processor = self.processor.name(),
                unprocessed = lag.unprocessed_events,
                average_age_ms = lag.average_event_age.num_milliseconds(),
                "catchup condition met"
            );
            return self.strategy.catchup(self.processor.as_ref()).await;
        }
        Ok(None)
    }

    /// Pull up to `batch_size` events, dispatching those outside the skip
    /// window. Returns the mean age across dispatched events, or zero when
    /// none were dispatched.
    async fn process_event_batch(
        &self,
        subscription: &mut dyn EventSubscription,
        catchup_result: Option<&CatchupResult>,
    ) -> FrameworkResult<Duration> {
        let mut total_age = Duration::zero();
        let mut dispatched: i32 = 0;

        for _ in 0..self.batch_size {
            let event = subscription.next().await?;
            total_age = total_age + (utc_now() - event.timestamp);

            if catchup_result.is_some_and(|window| window.should_skip(&event)) {
                continue;
            }
            dispatched += 1;

            // Restore causal context from the event so commands dispatched
            // by the handler inherit the right chain; the scope clears it
            // on every exit path.
            if let Some(correlation_id) = event.correlation_id {
                let ctx = ExecutionContext {
                    correlation_id: Some(correlation_id),
                    causation_id: Some(event.id),
                    command_id: None,
                };
                with_context(ctx, self.processor.handle(&event)).await?;
            } else {
                self.processor.handle(&event).await?;
            }
        }

        if dispatched == 0 {
            return Ok(Duration::zero());
        }
        Ok(total_age / dispatched)
    }
}
