// File: src/commands/bus.rs
//
// Command bus: middleware chain folded over delegate-to-aggregate dispatch

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CommandEnvelope, DispatchOutcome};
use crate::error::{FrameworkError, FrameworkResult};
use crate::routing::BoxFuture;

/// The innermost command handler: something that can execute a command
/// against its aggregate. Implemented by `AggregateRepository<A>`.
#[async_trait]
pub trait CommandTarget: Send + Sync {
    async fn execute(&self, command: &CommandEnvelope) -> FrameworkResult<()>;
}

/// Dispatch table from command type to the repository of the aggregate
/// whose routes declared a handler for it.
#[derive(Clone, Default)]
pub struct CommandTargetRegistry {
    targets: HashMap<TypeId, Arc<dyn CommandTarget>>,
}

impl CommandTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target for a command type. A command type handled by two
    /// aggregates is a wiring error.
    pub fn register(
        &mut self,
        command_type: TypeId,
        command_name: &'static str,
        target: Arc<dyn CommandTarget>,
    ) -> FrameworkResult<()> {
        if self.targets.insert(command_type, target).is_some() {
            return Err(FrameworkError::configuration(format!(
                "command {} is handled by more than one aggregate",
                command_name
            )));
        }
        Ok(())
    }

    pub async fn execute(&self, command: &CommandEnvelope) -> FrameworkResult<()> {
        match self.targets.get(&command.type_id()) {
            Some(target) => target.execute(command).await,
            None => Err(FrameworkError::NoHandler {
                operation: "command handler",
                message_type: command.command_name().to_string(),
            }),
        }
    }
}

/// Middleware wrapping command dispatch.
///
/// `intercept` either handles the command itself, observes it and forwards
/// via [`Next::run`], or short-circuits. Middleware registered first runs
/// outermost. Use [`InterceptRoutes`](crate::routing::InterceptRoutes) to
/// intercept only specific command types and pass the rest through.
#[async_trait]
pub trait CommandMiddleware: Send + Sync {
    async fn intercept(
        &self,
        command: CommandEnvelope,
        next: Next<'_>,
    ) -> FrameworkResult<DispatchOutcome>;
}

/// Continuation handle for the rest of the middleware chain. Copyable so
/// retrying middleware can invoke it more than once.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    bus: &'a CommandBus,
    index: usize,
}

impl<'a> Next<'a> {
    /// Invoke the remainder of the chain with the given command.
    pub async fn run(self, command: CommandEnvelope) -> FrameworkResult<DispatchOutcome> {
        self.bus.invoke(self.index, command).await
    }
}

/// Routes commands through the middleware chain to the aggregate that
/// handles them.
pub struct CommandBus {
    middleware: Vec<Arc<dyn CommandMiddleware>>,
    root: CommandTargetRegistry,
}

impl CommandBus {
    pub fn new(middleware: Vec<Arc<dyn CommandMiddleware>>, root: CommandTargetRegistry) -> Self {
        Self { middleware, root }
    }

    /// Dispatch a command through middleware to its aggregate.
    pub async fn dispatch(&self, command: CommandEnvelope) -> FrameworkResult<DispatchOutcome> {
        self.invoke(0, command).await
    }

    fn invoke(
        &self,
        index: usize,
        command: CommandEnvelope,
    ) -> BoxFuture<'_, FrameworkResult<DispatchOutcome>> {
        Box::pin(async move {
            match self.middleware.get(index) {
                Some(middleware) => {
                    let next = Next {
                        bus: self,
                        index: index + 1,
                    };
                    middleware.intercept(command, next).await
                }
                None => {
                    self.root.execute(&command).await?;
                    Ok(DispatchOutcome::Completed)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{new_id, Command};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
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

    struct CountingTarget {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandTarget for CountingTarget {
        async fn execute(&self, _command: &CommandEnvelope) -> FrameworkResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TraceMiddleware {
        label: &'static str,
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl CommandMiddleware for TraceMiddleware {
        async fn intercept(
            &self,
            command: CommandEnvelope,
            next: Next<'_>,
        ) -> FrameworkResult<DispatchOutcome> {
            self.trace.lock().await.push(self.label);
            next.run(command).await
        }
    }

    fn registry(target: Arc<CountingTarget>) -> CommandTargetRegistry {
        let mut registry = CommandTargetRegistry::new();
        registry
            .register(TypeId::of::<Noop>(), "Noop", target)
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn dispatch_reaches_the_registered_target() {
        let target = Arc::new(CountingTarget {
            calls: AtomicUsize::new(0),
        });
        let bus = CommandBus::new(Vec::new(), registry(target.clone()));

        let outcome = bus
            .dispatch(CommandEnvelope::new(Noop { id: new_id() }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrouted_command_raises() {
        let bus = CommandBus::new(Vec::new(), CommandTargetRegistry::new());
        let err = bus
            .dispatch(CommandEnvelope::new(Noop { id: new_id() }))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::NoHandler { .. }));
    }

    #[tokio::test]
    async fn first_registered_middleware_runs_outermost() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::new(CountingTarget {
            calls: AtomicUsize::new(0),
        });
        let bus = CommandBus::new(
            vec![
                Arc::new(TraceMiddleware {
                    label: "outer",
                    trace: trace.clone(),
                }),
                Arc::new(TraceMiddleware {
                    label: "inner",
                    trace: trace.clone(),
                }),
            ],
            registry(target),
        );

        bus.dispatch(CommandEnvelope::new(Noop { id: new_id() }))
            .await
            .unwrap();
        assert_eq!(*trace.lock().await, vec!["outer", "inner"]);
    }

    #[derive(Debug)]
    struct Other {
        id: Uuid,
    }

    impl Command for Other {
        fn aggregate_id(&self) -> Uuid {
            self.id
        }
    }

    /// Middleware that intercepts only `Noop`, routing everything else
    /// straight through.
    struct AuditMiddleware {
        routes: crate::routing::InterceptRoutes<Self>,
        audited: Arc<Mutex<Vec<&'static str>>>,
    }

    impl AuditMiddleware {
        fn new(audited: Arc<Mutex<Vec<&'static str>>>) -> Self {
            let mut routes = crate::routing::InterceptRoutes::new();
            routes.on::<Noop, _>(Self::audit_noop);
            Self { routes, audited }
        }

        async fn audit_noop(
            &self,
            command: CommandEnvelope,
            next: Next<'_>,
        ) -> FrameworkResult<DispatchOutcome> {
            self.audited.lock().await.push("noop");
            next.run(command).await
        }
    }

    #[async_trait]
    impl CommandMiddleware for AuditMiddleware {
        async fn intercept(
            &self,
            command: CommandEnvelope,
            next: Next<'_>,
        ) -> FrameworkResult<DispatchOutcome> {
            self.routes.dispatch(self, command, next).await
        }
    }

    #[tokio::test]
    async fn per_type_interceptors_pass_unrouted_commands_through() {
        let audited = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::new(CountingTarget {
            calls: AtomicUsize::new(0),
        });
        let mut registry = CommandTargetRegistry::new();
        registry
            .register(TypeId::of::<Noop>(), "Noop", target.clone())
            .unwrap();
        registry
            .register(TypeId::of::<Other>(), "Other", target.clone())
            .unwrap();
        let bus = CommandBus::new(
            vec![Arc::new(AuditMiddleware::new(audited.clone()))],
            registry,
        );

        bus.dispatch(CommandEnvelope::new(Noop { id: new_id() }))
            .await
            .unwrap();
        bus.dispatch(CommandEnvelope::new(Other { id: new_id() }))
            .await
            .unwrap();

        // Both commands reached the target; only Noop was intercepted.
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*audited.lock().await, vec!["noop"]);
    }

    #[tokio::test]
    async fn duplicate_target_registration_is_rejected() {
        let target = Arc::new(CountingTarget {
            calls: AtomicUsize::new(0),
        });
        let mut registry = CommandTargetRegistry::new();
        registry
            .register(TypeId::of::<Noop>(), "Noop", target.clone())
            .unwrap();
        let err = registry
            .register(TypeId::of::<Noop>(), "Noop", target)
            .unwrap_err();
        assert!(matches!(err, FrameworkError::Configuration { .. }));
    }
}
