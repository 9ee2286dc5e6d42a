// File: src/processing/saga_state_store.rs
//
// Pluggable saga state storage with step-completion tracking

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::FrameworkResult;

/// Storage backend for saga state and completed-step bookkeeping.
///
/// State moves as `serde_json::Value`; the typed view lives in
/// [`Saga`](super::saga::Saga). Step completion is the idempotency record:
/// `mark_step_complete` reports whether the step was newly marked, which
/// lets redeliveries detect that the work already happened.
#[async_trait]
pub trait SagaStateStore: Send + Sync {
    async fn load(&self, saga_id: &str) -> FrameworkResult<Option<Value>>;

    async fn save(&self, saga_id: &str, state: Value) -> FrameworkResult<()>;

    /// Remove the saga's state and step records (cleanup after completion).
    async fn delete(&self, saga_id: &str) -> FrameworkResult<()>;

    /// Mark a step complete. Returns `true` when newly marked, `false`
    /// when it was already complete.
    async fn mark_step_complete(&self, saga_id: &str, step_name: &str) -> FrameworkResult<bool>;

    async fn is_step_complete(&self, saga_id: &str, step_name: &str) -> FrameworkResult<bool>;
}

/// In-memory saga state store for development and testing.
pub struct InMemorySagaStateStore {
    states: RwLock<HashMap<String, Value>>,
    completed_steps: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemorySagaStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            completed_steps: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySagaStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SagaStateStore for InMemorySagaStateStore {
    async fn load(&self, saga_id: &str) -> FrameworkResult<Option<Value>> {
        Ok(self.states.read().await.get(saga_id).cloned())
    }

    async fn save(&self, saga_id: &str, state: Value) -> FrameworkResult<()> {
        self.states.write().await.insert(saga_id.to_string(), state);
        Ok(())
    }

    async fn delete(&self, saga_id: &str) -> FrameworkResult<()> {
        self.states.write().await.remove(saga_id);
        self.completed_steps.write().await.remove(saga_id);
        Ok(())
    }

    async fn mark_step_complete(&self, saga_id: &str, step_name: &str) -> FrameworkResult<bool> {
        let mut completed = self.completed_steps.write().await;
        Ok(completed
            .entry(saga_id.to_string())
            .or_default()
            .insert(step_name.to_string()))
    }

    async fn is_step_complete(&self, saga_id: &str, step_name: &str) -> FrameworkResult<bool> {
        Ok(self
            .completed_steps
            .read()
            .await
            .get(saga_id)
            .is_some_and(|steps| steps.contains(step_name)))
    }
}
