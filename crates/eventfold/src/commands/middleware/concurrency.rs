// File: src/commands/middleware/concurrency.rs
//
// Retry on optimistic-concurrency conflicts

use std::time::Duration;

use async_trait::async_trait;

use crate::commands::bus::{CommandMiddleware, Next};
use crate::domain::{CommandEnvelope, DispatchOutcome};
use crate::error::{FrameworkError, FrameworkResult};

/// Retries commands that fail with a concurrency conflict.
///
/// The command is attempted up to `max_attempts` times with `retry_delay`
/// between attempts; no sleep happens after the last attempt. Any other
/// error is re-raised immediately. When every attempt conflicts, a
/// concurrency error naming the last conflict is raised.
pub struct ConcurrencyRetryMiddleware {
    max_attempts: u32,
    retry_delay: Duration,
}

impl ConcurrencyRetryMiddleware {
    /// `max_attempts` counts the initial attempt: `3` means one try plus
    /// up to two retries. Must be positive.
    pub fn new(max_attempts: u32, retry_delay: Duration) -> FrameworkResult<Self> {
        if max_attempts == 0 {
            return Err(FrameworkError::configuration(
                "max_attempts must be positive",
            ));
        }
        Ok(Self {
            max_attempts,
            retry_delay,
        })
    }
}

#[async_trait]
impl CommandMiddleware for ConcurrencyRetryMiddleware {
    async fn intercept(
        &self,
        command: CommandEnvelope,
        next: Next<'_>,
    ) -> FrameworkResult<DispatchOutcome> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match next.run(command.clone()).await {
                Err(error) if error.is_concurrency_conflict() => {
                    tracing::warn!(
                        command_type = command.command_name(),
                        aggregate_id = %command.aggregate_id(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "concurrency conflict, retrying"
                    );
                    last_error = Some(error);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                other => return other,
            }
        }

        let last = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(FrameworkError::concurrency(format!(
            "max attempts ({}) reached: {}",
            self.max_attempts, last
        )))
    }
}
