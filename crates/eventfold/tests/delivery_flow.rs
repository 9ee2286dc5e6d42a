// File: tests/delivery_flow.rs
//
// Delivery strategies end to end: inline processor failures, async consume

mod common;

use std::sync::Arc;

use common::*;
use eventfold::{
    new_id, ApplicationBuilder, CatchupCondition, EventProcessorExecutor, FrameworkError,
    IdempotencyMiddleware, InMemoryEventTransport, InMemoryIdempotencyStore, NoCatchup,
};

#[tokio::test]
async fn processor_failure_fails_the_dispatch_but_the_event_is_already_persisted() {
    let grumpy = Arc::new(GrumpyProcessor::new(true));
    let app = ApplicationBuilder::new()
        .use_correlation_tracking()
        .add_middleware(Arc::new(IdempotencyMiddleware::new(Arc::new(
            InMemoryIdempotencyStore::new(),
        ))))
        .add_aggregate::<BankAccount>()
        .add_event_processor(grumpy.clone())
        .build()
        .unwrap();
    let account_id = new_id();

    let err = app
        .dispatch(open_account(account_id, "Alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, FrameworkError::Handler { .. }));

    // Publish writes before delivering: the event is durable even though
    // the command surfaced the processor's error.
    let events = app.event_bus().load_events(account_id, 0).await.unwrap();
    assert_eq!(events.len(), 1);

    // The failed dispatch did not record its idempotency key, so the
    // redelivered command reaches the aggregate, which rejects it against
    // the already-persisted state; no second event appears.
    let err = app
        .dispatch(open_account(account_id, "Alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, FrameworkError::Handler { .. }));
    let events = app.event_bus().load_events(account_id, 0).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn asynchronous_delivery_leaves_processing_to_executors() {
    let transport = Arc::new(InMemoryEventTransport::new());
    let projection = Arc::new(AccountBalances::new());
    let app = ApplicationBuilder::new()
        .use_correlation_tracking()
        .use_asynchronous_processing()
        .with_transport(transport.clone())
        .add_aggregate::<BankAccount>()
        .add_projection(projection.clone())
        .build()
        .unwrap();
    let account_id = new_id();

    app.dispatch(open_account(account_id, "Alice")).await.unwrap();
    app.dispatch(deposit(account_id, 25)).await.unwrap();

    // Nothing ran inline.
    assert_eq!(projection.balance_of(account_id).await, None);

    // A processor executor drains the subscription.
    let subscription = app.event_bus().subscribe("all").await.unwrap();
    transport.close();
    let executor = EventProcessorExecutor::new(
        projection.clone(),
        CatchupCondition::Never,
        Arc::new(NoCatchup),
        10,
    )
    .unwrap();
    executor.run(subscription).await.unwrap();

    assert_eq!(projection.balance_of(account_id).await, Some(25));
}

#[tokio::test]
async fn run_event_processors_drives_all_registered_processors() {
    let transport = Arc::new(InMemoryEventTransport::new());
    let projection = Arc::new(AccountBalances::new());
    let tolerant = Arc::new(GrumpyProcessor::new(false));
    let app = ApplicationBuilder::new()
        .use_asynchronous_processing()
        .with_transport(transport.clone())
        .add_aggregate::<BankAccount>()
        .add_projection(projection.clone())
        .add_event_processor(tolerant.clone())
        .build()
        .unwrap();
    let account_id = new_id();

    app.dispatch(open_account(account_id, "Alice")).await.unwrap();
    app.dispatch(deposit(account_id, 5)).await.unwrap();
    transport.close();

    app.run_event_processors().await.unwrap();

    assert_eq!(projection.balance_of(account_id).await, Some(5));
    assert_eq!(tolerant.handled.read().await.len(), 2);
}
