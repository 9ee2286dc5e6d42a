// File: src/processing/projectors.rs
//
// Projectors translate aggregate state into processor state during
// snapshot-based catchup

use async_trait::async_trait;

use crate::domain::Aggregate;
use crate::error::{FrameworkError, FrameworkResult};

use super::processor::EventProcessor;

/// Translates one fully-hydrated aggregate into processor state.
///
/// Used by [`FromAggregateSnapshot`](super::strategies::FromAggregateSnapshot):
/// called once per aggregate during catchup with the aggregate rebuilt
/// from snapshot plus events. The processor is passed type-erased; reach
/// the concrete type through [`EventProcessor::as_any`], or use
/// [`typed_projector`] which performs the downcast for you.
#[async_trait]
pub trait AggregateProjector<A: Aggregate>: Send + Sync {
    async fn project(&self, aggregate: &A, processor: &dyn EventProcessor) -> FrameworkResult<()>;
}

/// Build a projector from a closure over the concrete processor type.
///
/// The closure is synchronous; keep projection state reachable without
/// awaiting (e.g. `std::sync::RwLock`) or implement [`AggregateProjector`]
/// directly for async access.
///
/// ```ignore
/// let projector = typed_projector(|account: &BankAccount, view: &Balances| {
///     view.insert(account.root().id, account.balance);
///     Ok(())
/// });
/// ```
pub fn typed_projector<A, P, F>(project: F) -> TypedProjector<A, P, F>
where
    A: Aggregate,
    P: EventProcessor + 'static,
    F: Fn(&A, &P) -> FrameworkResult<()> + Send + Sync,
{
    TypedProjector {
        project,
        _marker: std::marker::PhantomData,
    }
}

pub struct TypedProjector<A, P, F> {
    project: F,
    _marker: std::marker::PhantomData<fn(&A, &P)>,
}

#[async_trait]
impl<A, P, F> AggregateProjector<A> for TypedProjector<A, P, F>
where
    A: Aggregate,
    P: EventProcessor + 'static,
    F: Fn(&A, &P) -> FrameworkResult<()> + Send + Sync,
{
    async fn project(&self, aggregate: &A, processor: &dyn EventProcessor) -> FrameworkResult<()> {
        let concrete = processor.as_any().downcast_ref::<P>().ok_or_else(|| {
            FrameworkError::configuration(format!(
                "projector expected processor type {}, got {}",
                std::any::type_name::<P>(),
                processor.name()
            ))
        })?;
        (self.project)(aggregate, concrete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{new_id, AggregateRoot, Event};
    use crate::routing::AggregateRoutes;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::any::Any;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        root: AggregateRoot,
        count: i64,
    }

    impl Aggregate for Counter {
        fn aggregate_type() -> &'static str {
            "counter"
        }

        fn new(id: Uuid) -> Self {
            Self {
                root: AggregateRoot::new(id),
                count: 0,
            }
        }

        fn root(&self) -> &AggregateRoot {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot {
            &mut self.root
        }

        fn configure(_routes: &mut AggregateRoutes<Self>) {}
    }

    struct CountView {
        counts: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl EventProcessor for CountView {
        fn name(&self) -> &'static str {
            "count_view"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn handle(&self, _event: &Event) -> crate::error::FrameworkResult<()> {
            Ok(())
        }
    }

    struct OtherProcessor;

    #[async_trait]
    impl EventProcessor for OtherProcessor {
        fn name(&self) -> &'static str {
            "other_processor"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn handle(&self, _event: &Event) -> crate::error::FrameworkResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn typed_projector_downcasts_and_projects() {
        let projector = typed_projector(|counter: &Counter, view: &CountView| {
            view.counts.lock().unwrap().push(counter.count);
            Ok(())
        });

        let mut counter = Counter::new(new_id());
        counter.count = 7;
        let view = CountView {
            counts: Mutex::new(Vec::new()),
        };

        projector.project(&counter, &view).await.unwrap();
        assert_eq!(*view.counts.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn typed_projector_rejects_the_wrong_processor_type() {
        let projector = typed_projector(|_counter: &Counter, _view: &CountView| Ok(()));
        let counter = Counter::new(new_id());

        let err = projector
            .project(&counter, &OtherProcessor)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::Configuration { .. }));
    }
}
