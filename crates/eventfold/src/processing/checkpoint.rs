// File: src/processing/checkpoint.rs
//
// Checkpoints: resumable progress tracking for snapshot-based catchup

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::FrameworkResult;

/// Progress record for one processor's catchup.
///
/// Tracks which aggregates have already been projected, the newest event
/// timestamp seen across them (the future skip window), and a running
/// event count for metrics.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub processor_name: String,
    pub processed_aggregate_ids: HashSet<Uuid>,
    pub max_timestamp: DateTime<Utc>,
    pub events_processed: u64,
}

impl Checkpoint {
    pub fn new(processor_name: impl Into<String>) -> Self {
        Self {
            processor_name: processor_name.into(),
            processed_aggregate_ids: HashSet::new(),
            max_timestamp: DateTime::<Utc>::MIN_UTC,
            events_processed: 0,
        }
    }
}

/// Persistence for catchup checkpoints. Saves atomically replace the
/// existing checkpoint for the same processor.
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    async fn load_checkpoint(&self, processor_name: &str) -> FrameworkResult<Option<Checkpoint>>;

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> FrameworkResult<()>;
}

/// In-memory checkpoint storage keyed by processor name.
pub struct InMemoryCheckpointBackend {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointBackend {
    pub fn new() -> Self {
        Self {
            checkpoints: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCheckpointBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointBackend for InMemoryCheckpointBackend {
    async fn load_checkpoint(&self, processor_name: &str) -> FrameworkResult<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(processor_name).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> FrameworkResult<()> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.processor_name.clone(), checkpoint.clone());
        Ok(())
    }
}
