// File: src/application/builder.rs
//
// Fluent builder wiring aggregates, processors, middleware, and the event
// pipeline into an Application

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregates::{AggregateRepository, RepositoryConfig, RepositoryConfigRegistry};
use crate::commands::bus::{CommandBus, CommandMiddleware, CommandTarget, CommandTargetRegistry};
use crate::commands::middleware::ContextPropagationMiddleware;
use crate::domain::Aggregate;
use crate::error::FrameworkResult;
use crate::events::delivery::{AsynchronousDelivery, EventDelivery, SynchronousDelivery};
use crate::events::store::{EventStore, InMemoryEventStore};
use crate::events::transport::{EventTransport, InMemoryEventTransport};
use crate::events::upcasting::{EventUpcaster, UpcasterMap, UpcastingConfig, UpcastingPipeline};
use crate::events::EventBus;
use crate::processing::{EventProcessor, ProcessorConfigRegistry, ProcessorExecutionConfig};
use crate::projections::bus::{QueryBus, QueryMiddleware};
use crate::projections::Projection;

use super::application::Application;
use super::container::{DependencyContainer, DependencyKey};

/// How published events reach processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryMode {
    Synchronous,
    Asynchronous,
}

struct AggregateRegistration {
    type_id: TypeId,
    build: Box<
        dyn FnOnce(Arc<EventBus>, &RepositoryConfigRegistry) -> BuiltAggregate + Send,
    >,
}

struct BuiltAggregate {
    command_types: Vec<(TypeId, &'static str)>,
    target: Arc<dyn CommandTarget>,
    repository: Box<dyn Any + Send + Sync>,
}

struct ProcessorRegistration {
    type_id: TypeId,
    processor: Arc<dyn EventProcessor>,
}

/// Builder for an event-sourced application.
///
/// Registers framework defaults (in-memory event store and transport,
/// lazy upcasting), collects the domain surface, and wires everything at
/// [`build`](Self::build): repositories for every aggregate, the upcasting
/// pipeline, the delivery strategy, and the command and query buses.
///
/// ```ignore
/// let app = ApplicationBuilder::new()
///     .use_correlation_tracking()
///     .add_middleware(Arc::new(LoggingMiddleware::default()))
///     .add_aggregate::<BankAccount>()
///     .add_projection(Arc::new(AccountBalances::new()))
///     .build()?;
/// app.dispatch(OpenAccount { .. }).await?;
/// ```
pub struct ApplicationBuilder {
    container: DependencyContainer,
    aggregates: Vec<AggregateRegistration>,
    processors: Vec<ProcessorRegistration>,
    projections: Vec<Arc<dyn Projection>>,
    middleware: Vec<Arc<dyn CommandMiddleware>>,
    query_middleware: Vec<Arc<dyn QueryMiddleware>>,
    upcasters: Vec<Arc<dyn EventUpcaster>>,
    repository_configs: RepositoryConfigRegistry,
    processor_configs: ProcessorConfigRegistry,
    delivery_mode: DeliveryMode,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        let mut container = DependencyContainer::new();

        // Framework defaults; each can be overridden before build().
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        container.register(store);
        let transport: Arc<dyn EventTransport> = Arc::new(InMemoryEventTransport::new());
        container.register(transport);
        container.register(UpcastingConfig::default());

        Self {
            container,
            aggregates: Vec::new(),
            processors: Vec::new(),
            projections: Vec::new(),
            middleware: Vec::new(),
            query_middleware: Vec::new(),
            upcasters: Vec::new(),
            repository_configs: RepositoryConfigRegistry::new(),
            processor_configs: ProcessorConfigRegistry::new(),
            delivery_mode: DeliveryMode::Synchronous,
        }
    }

    /// Register a dependency for later retrieval through the application
    /// (saga state stores, idempotency stores, gateways, configs).
    pub fn add_dependency<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.container.register(value);
        self
    }

    /// Register a lazily-built dependency with its declared dependencies.
    pub fn add_dependency_factory<T, F>(
        mut self,
        dependencies: Vec<DependencyKey>,
        build: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&DependencyContainer) -> FrameworkResult<T> + Send + Sync + 'static,
    {
        self.container.register_factory::<T, F>(dependencies, build);
        self
    }

    /// Register an aggregate type. Its repository is created at build time
    /// with the configuration registered for it, and its command handlers
    /// populate the command dispatch table.
    pub fn add_aggregate<A: Aggregate>(mut self) -> Self {
        self.aggregates.push(AggregateRegistration {
            type_id: TypeId::of::<A>(),
            build: Box::new(|event_bus, configs| {
                let repository =
                    Arc::new(AggregateRepository::<A>::new(event_bus, configs.get::<A>()));
                BuiltAggregate {
                    command_types: repository.command_types(),
                    target: repository.clone(),
                    repository: Box::new(repository),
                }
            }),
        });
        self
    }

    /// Register command middleware. Middleware runs in registration order,
    /// first registered outermost.
    pub fn add_middleware(mut self, middleware: Arc<dyn CommandMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn add_query_middleware(mut self, middleware: Arc<dyn QueryMiddleware>) -> Self {
        self.query_middleware.push(middleware);
        self
    }

    /// Register an event processor (read models, side effects, sagas).
    pub fn add_event_processor<P: EventProcessor + 'static>(mut self, processor: Arc<P>) -> Self {
        self.processors.push(ProcessorRegistration {
            type_id: TypeId::of::<P>(),
            processor,
        });
        self
    }

    /// Register a projection: an event processor that also serves queries.
    pub fn add_projection<P: Projection + 'static>(mut self, projection: Arc<P>) -> Self {
        self.projections.push(projection.clone());
        self.processors.push(ProcessorRegistration {
            type_id: TypeId::of::<P>(),
            processor: projection,
        });
        self
    }

    /// Register an event upcaster for schema evolution.
    pub fn add_upcaster(mut self, upcaster: Arc<dyn EventUpcaster>) -> Self {
        self.upcasters.push(upcaster);
        self
    }

    /// Processors execute inline during command handling (immediate
    /// consistency, single process). The default.
    pub fn use_synchronous_processing(mut self) -> Self {
        self.delivery_mode = DeliveryMode::Synchronous;
        self
    }

    /// Commands only publish; processors consume via subscriptions driven
    /// by [`Application::run_event_processors`].
    pub fn use_asynchronous_processing(mut self) -> Self {
        self.delivery_mode = DeliveryMode::Asynchronous;
        self
    }

    /// Enable correlation/causation propagation by registering the context
    /// middleware ahead of anything registered so far.
    pub fn use_correlation_tracking(mut self) -> Self {
        self.middleware.insert(0, Arc::new(ContextPropagationMiddleware));
        self
    }

    /// Override the event transport (message broker instead of in-memory).
    pub fn with_transport(mut self, transport: Arc<dyn EventTransport>) -> Self {
        self.container.register(transport);
        self
    }

    /// Override the event store backend.
    pub fn with_event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.container.register(store);
        self
    }

    /// Configure the upcasting pipeline (strategy, chain bound).
    pub fn configure_upcasting(mut self, config: UpcastingConfig) -> Self {
        self.container.register(config);
        self
    }

    pub fn configure_repository_defaults(mut self, config: RepositoryConfig) -> Self {
        self.repository_configs.set_default(config);
        self
    }

    pub fn configure_repository<A: Aggregate>(mut self, config: RepositoryConfig) -> Self {
        self.repository_configs.register::<A>(config);
        self
    }

    pub fn configure_processor_defaults(mut self, config: ProcessorExecutionConfig) -> Self {
        self.processor_configs.set_default(config);
        self
    }

    pub fn configure_processor<P: EventProcessor + 'static>(
        mut self,
        config: ProcessorExecutionConfig,
    ) -> Self {
        self.processor_configs.register::<P>(config);
        self
    }

    /// Wire the application: upcasting pipeline, delivery, event bus,
    /// repositories, and the command and query buses (built last).
    pub fn build(mut self) -> FrameworkResult<Application> {
        // Upcasting pipeline from the collected upcasters.
        let upcasting_config = self.container.resolve::<UpcastingConfig>()?;
        let pipeline = Arc::new(UpcastingPipeline::new(
            upcasting_config,
            UpcasterMap::from_upcasters(self.upcasters),
        ));
        self.container.register(pipeline);

        // Delivery strategy over the configured transport.
        let transport = self.container.resolve::<Arc<dyn EventTransport>>()?;
        let processor_instances: Vec<Arc<dyn EventProcessor>> = self
            .processors
            .iter()
            .map(|registration| Arc::clone(&registration.processor))
            .collect();
        let delivery: Arc<dyn EventDelivery> = match self.delivery_mode {
            DeliveryMode::Synchronous => Arc::new(SynchronousDelivery::new(
                transport,
                processor_instances,
            )),
            DeliveryMode::Asynchronous => Arc::new(AsynchronousDelivery::new(transport)),
        };
        self.container.register(delivery);

        // The event bus resolves last among pipeline components.
        self.container.register_factory::<Arc<EventBus>, _>(
            vec![
                DependencyKey::of::<Arc<dyn EventStore>>(),
                DependencyKey::of::<Arc<dyn EventDelivery>>(),
                DependencyKey::of::<Arc<UpcastingPipeline>>(),
            ],
            |container| {
                Ok(Arc::new(EventBus::new(
                    container.resolve::<Arc<dyn EventStore>>()?,
                    container.resolve::<Arc<dyn EventDelivery>>()?,
                    container.resolve::<Arc<UpcastingPipeline>>()?,
                )))
            },
        );
        self.container.resolve_all()?;
        let event_bus = self.container.resolve::<Arc<EventBus>>()?;

        // One repository per aggregate; their command tables merge into
        // the command-target registry.
        let mut targets = CommandTargetRegistry::new();
        let mut repositories: HashMap<TypeId, Box<dyn Any + Send + Sync>> = HashMap::new();
        for registration in self.aggregates {
            let built = (registration.build)(Arc::clone(&event_bus), &self.repository_configs);
            for (command_type, command_name) in built.command_types {
                targets.register(command_type, command_name, Arc::clone(&built.target))?;
            }
            repositories.insert(registration.type_id, built.repository);
        }

        let command_bus = Arc::new(CommandBus::new(self.middleware, targets));
        let query_bus = Arc::new(QueryBus::new(self.query_middleware, self.projections)?);

        let delivery = self.container.resolve::<Arc<dyn EventDelivery>>()?;
        let processors: Vec<(TypeId, Arc<dyn EventProcessor>)> = self
            .processors
            .into_iter()
            .map(|registration| (registration.type_id, registration.processor))
            .collect();

        tracing::debug!(
            aggregates = repositories.len(),
            processors = processors.len(),
            "application wired"
        );

        Ok(Application::new(
            command_bus,
            query_bus,
            event_bus,
            delivery,
            repositories,
            processors,
            self.processor_configs,
            self.container,
        ))
    }
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
