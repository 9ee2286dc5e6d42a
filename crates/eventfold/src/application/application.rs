// File: src/application/application.rs
//
// The wired application: command dispatch, queries, processor execution

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregates::AggregateRepository;
use crate::commands::bus::CommandBus;
use crate::domain::{Aggregate, Command, CommandEnvelope, DispatchOutcome, Query};
use crate::error::{FrameworkError, FrameworkResult};
use crate::events::delivery::EventDelivery;
use crate::events::EventBus;
use crate::processing::{EventProcessor, EventProcessorExecutor, ProcessorConfigRegistry};
use crate::projections::bus::QueryBus;

use super::container::DependencyContainer;

/// A fully wired event-sourced application.
///
/// Produced by [`ApplicationBuilder`](super::builder::ApplicationBuilder);
/// exposes command dispatch, typed queries, per-aggregate repositories,
/// and the processor runtime.
pub struct Application {
    command_bus: Arc<CommandBus>,
    query_bus: Arc<QueryBus>,
    event_bus: Arc<EventBus>,
    delivery: Arc<dyn EventDelivery>,
    repositories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    processors: Vec<(TypeId, Arc<dyn EventProcessor>)>,
    processor_configs: ProcessorConfigRegistry,
    dependencies: DependencyContainer,
}

impl Application {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        command_bus: Arc<CommandBus>,
        query_bus: Arc<QueryBus>,
        event_bus: Arc<EventBus>,
        delivery: Arc<dyn EventDelivery>,
        repositories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
        processors: Vec<(TypeId, Arc<dyn EventProcessor>)>,
        processor_configs: ProcessorConfigRegistry,
        dependencies: DependencyContainer,
    ) -> Self {
        Self {
            command_bus,
            query_bus,
            event_bus,
            delivery,
            repositories,
            processors,
            processor_configs,
            dependencies,
        }
    }

    /// Dispatch a command through the middleware chain to its aggregate.
    pub async fn dispatch<C: Command>(&self, command: C) -> FrameworkResult<DispatchOutcome> {
        self.dispatch_envelope(CommandEnvelope::new(command)).await
    }

    /// Dispatch an already-enveloped command (for callers that stamp their
    /// own correlation metadata).
    pub async fn dispatch_envelope(
        &self,
        envelope: CommandEnvelope,
    ) -> FrameworkResult<DispatchOutcome> {
        self.command_bus.dispatch(envelope).await
    }

    /// Dispatch a query to the projection that answers it.
    pub async fn query<Q: Query>(&self, query: Q) -> FrameworkResult<Q::Response> {
        self.query_bus.dispatch(query).await
    }

    /// The repository created for an aggregate type at build time.
    pub fn repository<A: Aggregate>(&self) -> FrameworkResult<Arc<AggregateRepository<A>>> {
        self.repositories
            .get(&TypeId::of::<A>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<AggregateRepository<A>>>())
            .cloned()
            .ok_or_else(|| {
                FrameworkError::configuration(format!(
                    "aggregate {} is not registered with this application",
                    std::any::type_name::<A>()
                ))
            })
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Retrieve a dependency registered with the builder.
    pub fn get_dependency<T: Clone + Send + Sync + 'static>(&self) -> FrameworkResult<T> {
        self.dependencies.resolve::<T>()
    }

    /// Run all registered event processors against "all"-stream
    /// subscriptions, each with its configured batch size and catchup
    /// behavior.
    ///
    /// Runs until every executor stops: cleanly when the transport closes
    /// its subscriptions, or with the first error a handler raises. This
    /// is the entry point for the asynchronous-delivery deployment shape,
    /// typically a dedicated process or task.
    pub async fn run_event_processors(&self) -> FrameworkResult<()> {
        if self.processors.is_empty() {
            return Err(FrameworkError::configuration(
                "no event processors registered; add them with add_event_processor() or add_projection()",
            ));
        }

        let mut handles = Vec::new();
        for (processor_type, processor) in &self.processors {
            let config = self.processor_configs.get_for(*processor_type);
            let subscription = self.delivery.subscribe("all").await?;
            let executor = EventProcessorExecutor::new(
                Arc::clone(processor),
                config.condition,
                config.strategy,
                config.batch_size,
            )?;
            tracing::debug!(processor = processor.name(), "starting processor executor");
            handles.push(tokio::spawn(async move {
                executor.run(subscription).await
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|join_error| {
                    FrameworkError::handler(format!("processor task failed: {join_error}"))
                })??;
        }
        Ok(())
    }
}
