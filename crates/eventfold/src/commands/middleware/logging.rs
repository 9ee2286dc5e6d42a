// File: src/commands/middleware/logging.rs
//
// Structured command logging with correlation context

use async_trait::async_trait;
use tracing::Level;

use crate::commands::bus::{CommandMiddleware, Next};
use crate::context::get_context;
use crate::domain::{CommandEnvelope, DispatchOutcome};
use crate::error::FrameworkResult;

/// Logs each received command with its type name, aggregate id, and any
/// context ids present. Command payloads are never logged; they may carry
/// PII or secrets.
///
/// For correlation ids to appear, register
/// [`ContextPropagationMiddleware`](super::ContextPropagationMiddleware)
/// before this middleware.
pub struct LoggingMiddleware {
    level: Level,
}

impl LoggingMiddleware {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

#[async_trait]
impl CommandMiddleware for LoggingMiddleware {
    async fn intercept(
        &self,
        command: CommandEnvelope,
        next: Next<'_>,
    ) -> FrameworkResult<DispatchOutcome> {
        let ctx = get_context();
        let command_type = command.command_name();
        let aggregate_id = command.aggregate_id();

        // tracing levels are static per call site; select the site by level.
        macro_rules! log_received {
            ($level:ident) => {
                tracing::$level!(
                    command_type,
                    aggregate_id = %aggregate_id,
                    correlation_id = ?ctx.correlation_id,
                    causation_id = ?ctx.causation_id,
                    command_id = ?ctx.command_id,
                    "received command"
                )
            };
        }
        match self.level {
            Level::ERROR => log_received!(error),
            Level::WARN => log_received!(warn),
            Level::INFO => log_received!(info),
            Level::DEBUG => log_received!(debug),
            Level::TRACE => log_received!(trace),
        }

        next.run(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::bus::{CommandBus, CommandTarget, CommandTargetRegistry};
    use crate::domain::{new_id, Command};
    use std::any::TypeId;
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Debug)]
    struct Noop {
        id: Uuid,
    }

    impl Command for Noop {
        fn aggregate_id(&self) -> Uuid {
            self.id
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl CommandTarget for AcceptAll {
        async fn execute(&self, _command: &CommandEnvelope) -> FrameworkResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn logging_passes_the_command_through() {
        let mut registry = CommandTargetRegistry::new();
        registry
            .register(TypeId::of::<Noop>(), "Noop", Arc::new(AcceptAll))
            .unwrap();
        let bus = CommandBus::new(vec![Arc::new(LoggingMiddleware::default())], registry);

        let outcome = bus
            .dispatch(CommandEnvelope::new(Noop { id: new_id() }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
    }
}
