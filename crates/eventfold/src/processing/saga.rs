// File: src/processing/saga.rs
//
// Saga coordination: typed state access and per-step idempotency

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FrameworkResult;

use super::saga_state_store::SagaStateStore;

/// Whether a saga step's body actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    /// The step was already complete for this saga instance; the body was
    /// not invoked.
    Skipped,
}

/// Convention trait for event payloads that carry their saga id in a
/// `saga_id` field. Lets [`Saga::step_for`] extract the id without an
/// explicit argument; events keyed differently pass the id to
/// [`Saga::step`] instead.
pub trait HasSagaId {
    fn saga_id(&self) -> &str;
}

/// Saga support embedded in an event processor: typed state persistence
/// plus step idempotency.
///
/// A saga is an [`EventProcessor`](super::EventProcessor) coordinating a
/// long-running, multi-step business process. It embeds a `Saga<S>` next
/// to its event routes and wraps each handler body in
/// [`step`](Self::step), which guarantees at-most-one execution per
/// `(saga instance, step name)` even under event redelivery:
///
/// ```ignore
/// struct CheckoutSaga {
///     saga: Saga<CheckoutState>,
///     routes: EventRoutes<Self>,
/// }
///
/// impl CheckoutSaga {
///     async fn on_initiated(&self, event: CheckoutInitiated) -> FrameworkResult<()> {
///         self.saga
///             .step_for(&event, "initiate", || async {
///                 self.saga.set_state(event.saga_id(), &CheckoutState::started()).await
///             })
///             .await?;
///         Ok(())
///     }
/// }
/// ```
pub struct Saga<S> {
    state_store: Arc<dyn SagaStateStore>,
    _state: PhantomData<fn() -> S>,
}

impl<S> Saga<S>
where
    S: Serialize + DeserializeOwned + Send,
{
    pub fn new(state_store: Arc<dyn SagaStateStore>) -> Self {
        Self {
            state_store,
            _state: PhantomData,
        }
    }

    /// Load this saga instance's state, if any.
    pub async fn state(&self, saga_id: &str) -> FrameworkResult<Option<S>> {
        match self.state_store.load(saga_id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_state(&self, saga_id: &str, state: &S) -> FrameworkResult<()> {
        self.state_store
            .save(saga_id, serde_json::to_value(state)?)
            .await
    }

    /// Remove state and step records once the saga completes.
    pub async fn delete_state(&self, saga_id: &str) -> FrameworkResult<()> {
        self.state_store.delete(saga_id).await
    }

    pub async fn is_step_complete(&self, saga_id: &str, step_name: &str) -> FrameworkResult<bool> {
        self.state_store.is_step_complete(saga_id, step_name).await
    }

    pub async fn mark_step_complete(
        &self,
        saga_id: &str,
        step_name: &str,
    ) -> FrameworkResult<bool> {
        self.state_store.mark_step_complete(saga_id, step_name).await
    }

    /// Run a step body with idempotency.
    ///
    /// An already-complete step logs and returns
    /// [`StepOutcome::Skipped`] without running the body. Otherwise the
    /// body runs; success marks the step complete, failure does not, so a
    /// redelivered event retries the step.
    pub async fn step<F, Fut>(
        &self,
        saga_id: &str,
        step_name: &str,
        body: F,
    ) -> FrameworkResult<StepOutcome>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FrameworkResult<()>> + Send,
    {
        if self.is_step_complete(saga_id, step_name).await? {
            tracing::info!(saga_id, step_name, "step already complete, skipping");
            return Ok(StepOutcome::Skipped);
        }

        match body().await {
            Ok(()) => {
                self.mark_step_complete(saga_id, step_name).await?;
                tracing::info!(saga_id, step_name, "step completed");
                Ok(StepOutcome::Executed)
            }
            Err(error) => {
                tracing::error!(saga_id, step_name, error = %error, "step failed");
                Err(error)
            }
        }
    }

    /// [`step`](Self::step) with the saga id extracted from the event via
    /// the [`HasSagaId`] convention.
    pub async fn step_for<E, F, Fut>(
        &self,
        event: &E,
        step_name: &str,
        body: F,
    ) -> FrameworkResult<StepOutcome>
    where
        E: HasSagaId + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FrameworkResult<()>> + Send,
    {
        self.step(event.saga_id(), step_name, body).await
    }
}
