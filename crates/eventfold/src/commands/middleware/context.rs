// File: src/commands/middleware/context.rs
//
// Context propagation: establishes the execution context for each command

use async_trait::async_trait;

use crate::commands::bus::{CommandMiddleware, Next};
use crate::context::{with_context, ExecutionContext};
use crate::domain::{new_id, CommandEnvelope, DispatchOutcome};
use crate::error::FrameworkResult;

/// Propagates correlation and causation ids from commands into the
/// task-scoped execution context.
///
/// A command without a correlation id marks a system entry point: a fresh
/// correlation id is generated, and a missing causation id self-references
/// the correlation id. The context is active for the duration of the inner
/// handler and dropped on every exit path, success or failure, so events
/// emitted by the aggregate inherit the correct chain and nothing leaks
/// into the next dispatch.
///
/// Register this middleware early, before logging or anything else that
/// reads the context.
pub struct ContextPropagationMiddleware;

#[async_trait]
impl CommandMiddleware for ContextPropagationMiddleware {
    async fn intercept(
        &self,
        command: CommandEnvelope,
        next: Next<'_>,
    ) -> FrameworkResult<DispatchOutcome> {
        let correlation_id = command.correlation_id().unwrap_or_else(new_id);
        let causation_id = command.causation_id().unwrap_or(correlation_id);

        let ctx = ExecutionContext {
            correlation_id: Some(correlation_id),
            causation_id: Some(causation_id),
            command_id: Some(command.command_id()),
        };

        with_context(ctx, next.run(command)).await
    }
}
