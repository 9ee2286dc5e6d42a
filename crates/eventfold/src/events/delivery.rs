// File: src/events/delivery.rs
//
// Delivery strategies: synchronous inline execution vs. publish-only

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Event;
use crate::error::FrameworkResult;
use crate::events::transport::{EventSubscription, EventTransport};
use crate::processing::EventProcessor;

/// Strategy for delivering published events to processors.
///
/// Delivery unifies the transport (infrastructure) with the execution
/// policy: synchronous delivery runs every registered processor inline
/// during the publish, asynchronous delivery only publishes and leaves
/// processors to consume via subscriptions.
#[async_trait]
pub trait EventDelivery: Send + Sync {
    /// Deliver freshly persisted events according to the strategy.
    async fn deliver(&self, events: &[Event]) -> FrameworkResult<()>;

    /// Create a subscription for consuming events asynchronously. Used by
    /// processor executors regardless of the delivery strategy.
    async fn subscribe(&self, identifier: &str) -> FrameworkResult<Box<dyn EventSubscription>>;
}

/// Publish to the transport, then invoke every registered processor per
/// event, in registration order, before the publish returns.
///
/// Processor failures propagate and fail the publish, and therefore the
/// command that produced the events. Simple single-process model with
/// immediate consistency.
pub struct SynchronousDelivery {
    transport: Arc<dyn EventTransport>,
    processors: Vec<Arc<dyn EventProcessor>>,
}

impl SynchronousDelivery {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        processors: Vec<Arc<dyn EventProcessor>>,
    ) -> Self {
        Self {
            transport,
            processors,
        }
    }
}

#[async_trait]
impl EventDelivery for SynchronousDelivery {
    async fn deliver(&self, events: &[Event]) -> FrameworkResult<()> {
        self.transport.publish_events(events).await?;

        for event in events {
            for processor in &self.processors {
                processor.handle(event).await?;
            }
        }
        Ok(())
    }

    async fn subscribe(&self, identifier: &str) -> FrameworkResult<Box<dyn EventSubscription>> {
        self.transport.subscribe(identifier).await
    }
}

/// Publish to the transport only. Processors run in separate executor
/// tasks consuming subscriptions; command latency excludes processor work
/// and processor failures do not affect command success.
pub struct AsynchronousDelivery {
    transport: Arc<dyn EventTransport>,
}

impl AsynchronousDelivery {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl EventDelivery for AsynchronousDelivery {
    async fn deliver(&self, events: &[Event]) -> FrameworkResult<()> {
        self.transport.publish_events(events).await
    }

    async fn subscribe(&self, identifier: &str) -> FrameworkResult<Box<dyn EventSubscription>> {
        self.transport.subscribe(identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_id;
    use crate::error::FrameworkError;
    use crate::events::transport::InMemoryEventTransport;
    use std::any::Any;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Ping(u32);

    struct Recorder {
        seen: Mutex<Vec<u32>>,
        fail_on: Option<u32>,
    }

    #[async_trait]
    impl EventProcessor for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn handle(&self, event: &Event) -> FrameworkResult<()> {
            let ping = event.payload::<Ping>().unwrap();
            if self.fail_on == Some(ping.0) {
                return Err(FrameworkError::handler("recorder rejected event"));
            }
            self.seen.lock().await.push(ping.0);
            Ok(())
        }
    }

    fn events() -> Vec<Event> {
        vec![
            Event::new(new_id(), 1, Ping(1)),
            Event::new(new_id(), 2, Ping(2)),
        ]
    }

    #[tokio::test]
    async fn synchronous_delivery_invokes_processors_inline() {
        let transport = Arc::new(InMemoryEventTransport::new());
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let delivery = SynchronousDelivery::new(transport.clone(), vec![recorder.clone()]);

        delivery.deliver(&events()).await.unwrap();

        assert_eq!(*recorder.seen.lock().await, vec![1, 2]);
        let mut sub = delivery.subscribe("all").await.unwrap();
        assert_eq!(sub.depth().await, 2);
    }

    #[tokio::test]
    async fn synchronous_delivery_propagates_processor_errors() {
        let transport = Arc::new(InMemoryEventTransport::new());
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail_on: Some(2),
        });
        let delivery = SynchronousDelivery::new(transport.clone(), vec![recorder]);

        let err = delivery.deliver(&events()).await.unwrap_err();
        assert!(matches!(err, FrameworkError::Handler { .. }));

        // The publish happened before processors ran: subscriptions still
        // see both events.
        let mut sub = delivery.subscribe("all").await.unwrap();
        assert_eq!(sub.depth().await, 2);
    }

    #[tokio::test]
    async fn asynchronous_delivery_only_publishes() {
        let transport = Arc::new(InMemoryEventTransport::new());
        let delivery = AsynchronousDelivery::new(transport.clone());

        delivery.deliver(&events()).await.unwrap();

        let mut sub = delivery.subscribe("all").await.unwrap();
        assert_eq!(sub.depth().await, 2);
        assert_eq!(sub.next().await.unwrap().payload::<Ping>().unwrap().0, 1);
    }
}
