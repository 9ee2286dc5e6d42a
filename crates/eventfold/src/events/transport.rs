// File: src/events/transport.rs
//
// Ephemeral pub/sub transport delivering published events to subscriptions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::Event;
use crate::error::{FrameworkError, FrameworkResult};

/// Async pull interface over an event stream.
#[async_trait]
pub trait EventSubscription: Send {
    /// Number of unread events currently available without blocking. A
    /// snapshot value; new publishes change it.
    async fn depth(&self) -> usize;

    /// The next event in the stream, blocking until one is available.
    /// Fails with [`FrameworkError::SubscriptionClosed`] when the stream
    /// has ended.
    async fn next(&mut self) -> FrameworkResult<Event>;
}

/// Real-time event messaging, separate from the durable store.
///
/// The transport is best-effort delivery for live consumers; durability is
/// the event store's job. The subscription identifier may name an
/// aggregate, an event type, or the literal "all"; semantics belong to the
/// implementation, and production transports must support per-stream
/// filtering.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn subscribe(&self, identifier: &str) -> FrameworkResult<Box<dyn EventSubscription>>;

    async fn publish_events(&self, events: &[Event]) -> FrameworkResult<()>;
}

struct TransportShared {
    log: Mutex<Vec<Event>>,
    closed: AtomicBool,
    notify: Notify,
}

/// In-memory event transport.
///
/// All subscriptions share one ordered global log regardless of the
/// subscribe identifier, and new subscriptions start at the beginning of
/// the log. Safe for concurrent use. `close()` ends every subscription
/// once the log has been drained.
pub struct InMemoryEventTransport {
    shared: Arc<TransportShared>,
}

impl InMemoryEventTransport {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TransportShared {
                log: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal end-of-stream to all subscriptions. Events already published
    /// remain readable; once drained, `next()` fails with
    /// `SubscriptionClosed`.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }
}

impl Default for InMemoryEventTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventTransport for InMemoryEventTransport {
    async fn subscribe(&self, _identifier: &str) -> FrameworkResult<Box<dyn EventSubscription>> {
        // The identifier is ignored: the in-memory transport keeps a single
        // global stream shared by every subscription.
        Ok(Box::new(InMemoryEventSubscription {
            shared: Arc::clone(&self.shared),
            index: 0,
        }))
    }

    async fn publish_events(&self, events: &[Event]) -> FrameworkResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(FrameworkError::storage("transport is closed"));
        }
        {
            let mut log = self
                .shared
                .log
                .lock()
                .map_err(|_| FrameworkError::storage("transport log poisoned"))?;
            log.extend(events.iter().cloned());
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

/// Index-based subscription over the in-memory transport's global log.
pub struct InMemoryEventSubscription {
    shared: Arc<TransportShared>,
    index: usize,
}

#[async_trait]
impl EventSubscription for InMemoryEventSubscription {
    async fn depth(&self) -> usize {
        self.shared
            .log
            .lock()
            .map(|log| log.len().saturating_sub(self.index))
            .unwrap_or(0)
    }

    async fn next(&mut self) -> FrameworkResult<Event> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let log = self
                    .shared
                    .log
                    .lock()
                    .map_err(|_| FrameworkError::storage("transport log poisoned"))?;
                if self.index < log.len() {
                    let event = log[self.index].clone();
                    self.index += 1;
                    return Ok(event);
                }
                if self.shared.closed.load(Ordering::SeqCst) {
                    return Err(FrameworkError::SubscriptionClosed);
                }
            }
            notified.await;
        }
    }
}
