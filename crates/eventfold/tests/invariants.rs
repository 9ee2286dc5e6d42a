// File: tests/invariants.rs
//
// Property tests over the framework's universal invariants

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use common::*;
use eventfold::{
    new_id, Aggregate, ApplicationBuilder, CatchupResult, CommandEnvelope,
    ConcurrencyRetryMiddleware, Event, EventUpcaster, FrameworkError, InMemoryEventStore,
    PayloadUpcaster, UpcasterMap, UpcastingConfig, UpcastingPipeline,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Tick;

proptest! {
    /// should_skip(e) holds exactly when e.timestamp <= skip_before.
    #[test]
    fn skip_window_matches_its_boundary(offset_ms in -100_000i64..100_000) {
        let boundary = eventfold::utc_now();
        let window = CatchupResult::skip_before(boundary);
        let event = Event::new(new_id(), 1, Tick)
            .with_timestamp(boundary + Duration::milliseconds(offset_ms));

        prop_assert_eq!(window.should_skip(&event), offset_ms <= 0);
    }

    /// An absent boundary never skips.
    #[test]
    fn absent_window_never_skips(offset_ms in -100_000i64..100_000) {
        let window = CatchupResult::default();
        let event = Event::new(new_id(), 1, Tick)
            .with_timestamp(eventfold::utc_now() + Duration::milliseconds(offset_ms));
        prop_assert!(!window.should_skip(&event));
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct SchemaV1;

#[derive(Debug, Clone, PartialEq, Default)]
struct SchemaV2;

#[derive(Debug, Clone, PartialEq, Default)]
struct SchemaV3;

struct Step<S, T>(std::marker::PhantomData<fn(&S) -> T>);

impl<S, T> Step<S, T> {
    fn new() -> Self {
        Step(std::marker::PhantomData)
    }
}

impl<S, T> PayloadUpcaster for Step<S, T>
where
    S: Send + Sync + std::fmt::Debug + Clone + Default + 'static,
    T: Send + Sync + std::fmt::Debug + Clone + Default + 'static,
{
    type Source = S;
    type Target = T;

    fn upcast_payload(&self, _source: &S) -> T {
        T::default()
    }
}

proptest! {
    /// A V1 -> V2 -> V3 chain needs one iteration per step plus one to
    /// observe stability: it converges exactly when the configured bound
    /// allows three iterations, and trips the cycle guard below that.
    #[test]
    fn chain_bound_accounting(max_steps in 1usize..12) {
        let upcasters: Vec<Arc<dyn EventUpcaster>> = vec![
            Arc::new(Step::<SchemaV1, SchemaV2>::new()),
            Arc::new(Step::<SchemaV2, SchemaV3>::new()),
        ];
        let pipeline = UpcastingPipeline::new(
            UpcastingConfig {
                max_steps,
                ..UpcastingConfig::default()
            },
            UpcasterMap::from_upcasters(upcasters),
        );
        let event = Event::new(new_id(), 1, SchemaV1);

        let result = pipeline.upcast_chain(&event);
        if max_steps >= 3 {
            prop_assert!(result.unwrap().payload_is::<SchemaV3>());
        } else {
            let is_cycle = matches!(result, Err(FrameworkError::UpcastingCycle { .. }));
            prop_assert!(is_cycle);
        }
    }

    /// A two-type loop never converges, whatever the bound.
    #[test]
    fn cycles_always_trip_the_guard(max_steps in 1usize..12) {
        let upcasters: Vec<Arc<dyn EventUpcaster>> = vec![
            Arc::new(Step::<SchemaV1, SchemaV2>::new()),
            Arc::new(Step::<SchemaV2, SchemaV1>::new()),
        ];
        let pipeline = UpcastingPipeline::new(
            UpcastingConfig {
                max_steps,
                ..UpcastingConfig::default()
            },
            UpcasterMap::from_upcasters(upcasters),
        );
        let event = Event::new(new_id(), 1, SchemaV1);

        let is_cycle = matches!(
            pipeline.upcast_chain(&event),
            Err(FrameworkError::UpcastingCycle { .. })
        );
        prop_assert!(is_cycle);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Event-sourcing round trip: replaying the persisted events on a
    /// fresh aggregate reproduces the live aggregate's public state.
    #[test]
    fn replay_reproduces_live_state(amounts in proptest::collection::vec(1i64..1000, 0..8)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryEventStore::new());
            let app = ApplicationBuilder::new()
                .use_correlation_tracking()
                .with_event_store(store)
                .add_aggregate::<BankAccount>()
                .build()
                .unwrap();
            let account_id = new_id();

            app.dispatch(open_account(account_id, "Alice")).await.unwrap();
            let mut expected = 0;
            for amount in &amounts {
                app.dispatch(deposit(account_id, *amount)).await.unwrap();
                expected += amount;
            }

            let replayed = app
                .repository::<BankAccount>()
                .unwrap()
                .load(account_id)
                .await
                .unwrap();
            assert_eq!(replayed.balance, expected);
            assert_eq!(replayed.root().version, amounts.len() as u64 + 1);
        });
    }

    /// Retry accounting: k-1 conflicts then success completes; k conflicts
    /// in a row raise a concurrency error after exactly k inner calls.
    #[test]
    fn retry_calls_the_inner_handler_exactly_k_times(max_attempts in 1u32..6) {
        use async_trait::async_trait;
        use eventfold::{CommandBus, CommandTarget, CommandTargetRegistry, FrameworkResult};
        use std::any::TypeId;
        use std::sync::atomic::{AtomicU32, Ordering};

        #[derive(Debug)]
        struct Poke {
            id: uuid::Uuid,
        }

        impl eventfold::Command for Poke {
            fn aggregate_id(&self) -> uuid::Uuid {
                self.id
            }
        }

        struct ConflictsFirst {
            conflicts: u32,
            calls: AtomicU32,
        }

        #[async_trait]
        impl CommandTarget for ConflictsFirst {
            async fn execute(&self, _command: &CommandEnvelope) -> FrameworkResult<()> {
                if self.calls.fetch_add(1, Ordering::SeqCst) < self.conflicts {
                    return Err(FrameworkError::concurrency("stale version"));
                }
                Ok(())
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            // k-1 conflicts then success: completes.
            let recovering = Arc::new(ConflictsFirst {
                conflicts: max_attempts - 1,
                calls: AtomicU32::new(0),
            });
            let mut registry = CommandTargetRegistry::new();
            registry
                .register(TypeId::of::<Poke>(), "Poke", recovering.clone())
                .unwrap();
            let bus = CommandBus::new(
                vec![Arc::new(
                    ConcurrencyRetryMiddleware::new(max_attempts, StdDuration::ZERO).unwrap(),
                )],
                registry,
            );
            bus.dispatch(CommandEnvelope::new(Poke { id: new_id() }))
                .await
                .unwrap();
            assert_eq!(recovering.calls.load(Ordering::SeqCst), max_attempts);

            // k conflicts in a row: a concurrency error, handler called
            // exactly k times.
            let hopeless = Arc::new(ConflictsFirst {
                conflicts: u32::MAX,
                calls: AtomicU32::new(0),
            });
            let mut registry = CommandTargetRegistry::new();
            registry
                .register(TypeId::of::<Poke>(), "Poke", hopeless.clone())
                .unwrap();
            let bus = CommandBus::new(
                vec![Arc::new(
                    ConcurrencyRetryMiddleware::new(max_attempts, StdDuration::ZERO).unwrap(),
                )],
                registry,
            );
            let err = bus
                .dispatch(CommandEnvelope::new(Poke { id: new_id() }))
                .await
                .unwrap_err();
            assert!(err.is_concurrency_conflict());
            assert_eq!(hopeless.calls.load(Ordering::SeqCst), max_attempts);
        });
    }
}
