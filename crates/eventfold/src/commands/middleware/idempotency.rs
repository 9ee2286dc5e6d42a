// File: src/commands/middleware/idempotency.rs
//
// Idempotency: skip commands whose key has already been processed

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::commands::bus::{CommandMiddleware, Next};
use crate::domain::{CommandEnvelope, DispatchOutcome};
use crate::error::FrameworkResult;

/// Storage backend for processed idempotency keys.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn store_idempotency_key(&self, key: &str) -> FrameworkResult<()>;

    async fn has_idempotency_key(&self, key: &str) -> FrameworkResult<bool>;
}

/// In-memory key set. Keys are lost on restart; production deployments
/// back this with a persistent store, optionally with a TTL.
pub struct InMemoryIdempotencyStore {
    keys: RwLock<HashSet<String>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashSet::new()),
        }
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn store_idempotency_key(&self, key: &str) -> FrameworkResult<()> {
        self.keys.write().await.insert(key.to_string());
        Ok(())
    }

    async fn has_idempotency_key(&self, key: &str) -> FrameworkResult<bool> {
        Ok(self.keys.read().await.contains(key))
    }
}

/// Never detects duplicates; disables idempotency checking.
pub struct NullIdempotencyStore;

#[async_trait]
impl IdempotencyStore for NullIdempotencyStore {
    async fn store_idempotency_key(&self, _key: &str) -> FrameworkResult<()> {
        Ok(())
    }

    async fn has_idempotency_key(&self, _key: &str) -> FrameworkResult<bool> {
        Ok(false)
    }
}

/// Skips commands whose idempotency key has already been recorded.
///
/// Commands without a key pass through unchanged. For commands with one:
/// a known key returns [`DispatchOutcome::SkippedDuplicate`] without
/// invoking the inner handler; otherwise the handler runs and the key is
/// recorded only after it succeeds, so failed commands stay retriable.
pub struct IdempotencyMiddleware {
    store: std::sync::Arc<dyn IdempotencyStore>,
}

impl IdempotencyMiddleware {
    pub fn new(store: std::sync::Arc<dyn IdempotencyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommandMiddleware for IdempotencyMiddleware {
    async fn intercept(
        &self,
        command: CommandEnvelope,
        next: Next<'_>,
    ) -> FrameworkResult<DispatchOutcome> {
        let Some(key) = command.idempotency_key().map(str::to_string) else {
            return next.run(command).await;
        };

        if self.store.has_idempotency_key(&key).await? {
            tracing::warn!(
                command_type = command.command_name(),
                idempotency_key = %key,
                "skipping previously processed command"
            );
            return Ok(DispatchOutcome::SkippedDuplicate);
        }

        let outcome = next.run(command).await?;
        self.store.store_idempotency_key(&key).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::bus::{CommandBus, CommandTarget, CommandTargetRegistry};
    use crate::domain::{new_id, Command};
    use crate::error::FrameworkError;
    use std::any::TypeId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Debug)]
    struct Tracked {
        id: Uuid,
        key: Option<String>,
    }

    impl Command for Tracked {
        fn aggregate_id(&self) -> Uuid {
            self.id
        }

        fn idempotency_key(&self) -> Option<String> {
            self.key.clone()
        }
    }

    struct Target {
        calls: AtomicU32,
        fail_first: AtomicU32,
    }

    #[async_trait]
    impl CommandTarget for Target {
        async fn execute(&self, _command: &CommandEnvelope) -> FrameworkResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { None }
            }).is_ok()
            {
                return Err(FrameworkError::handler("transient failure"));
            }
            Ok(())
        }
    }

    fn bus(target: Arc<Target>) -> CommandBus {
        let mut registry = CommandTargetRegistry::new();
        registry
            .register(TypeId::of::<Tracked>(), "Tracked", target)
            .unwrap();
        CommandBus::new(
            vec![Arc::new(IdempotencyMiddleware::new(Arc::new(
                InMemoryIdempotencyStore::new(),
            )))],
            registry,
        )
    }

    fn target() -> Arc<Target> {
        Arc::new(Target {
            calls: AtomicU32::new(0),
            fail_first: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn duplicate_keys_skip_the_handler() {
        let target = target();
        let bus = bus(target.clone());
        let id = new_id();

        let first = bus
            .dispatch(CommandEnvelope::new(Tracked {
                id,
                key: Some("op-1".into()),
            }))
            .await
            .unwrap();
        assert_eq!(first, DispatchOutcome::Completed);

        let second = bus
            .dispatch(CommandEnvelope::new(Tracked {
                id,
                key: Some("op-1".into()),
            }))
            .await
            .unwrap();
        assert_eq!(second, DispatchOutcome::SkippedDuplicate);
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keyless_commands_pass_through() {
        let target = target();
        let bus = bus(target.clone());
        let id = new_id();

        for _ in 0..2 {
            bus.dispatch(CommandEnvelope::new(Tracked { id, key: None }))
                .await
                .unwrap();
        }
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn keys_are_recorded_only_after_success() {
        let target = Arc::new(Target {
            calls: AtomicU32::new(0),
            fail_first: AtomicU32::new(1),
        });
        let bus = bus(target.clone());
        let id = new_id();

        let err = bus
            .dispatch(CommandEnvelope::new(Tracked {
                id,
                key: Some("op-2".into()),
            }))
            .await;
        assert!(err.is_err());

        // The failed attempt did not consume the key; the retry runs.
        let outcome = bus
            .dispatch(CommandEnvelope::new(Tracked {
                id,
                key: Some("op-2".into()),
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
    }
}
