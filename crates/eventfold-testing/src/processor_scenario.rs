// File: src/processor_scenario.rs
//
// Given/when/then harness for event processors and projections

use std::sync::Arc;

use eventfold::{Event, EventPayload, EventProcessor, FrameworkError};
use uuid::Uuid;

enum Expectation<P> {
    Processor(Box<dyn Fn(&P) -> bool>, String),
    Error(Box<dyn Fn(&FrameworkError) -> bool>, String),
    NoErrors,
}

/// Scenario-style test harness for an event processor.
///
/// Feed events (`when_event` wraps payloads in ascending sequence numbers,
/// `when` takes a full event), then assert over the processor's state.
/// Handler errors are collected, not propagated, so scenarios can assert
/// on them.
///
/// ```ignore
/// ProcessorScenario::new(Arc::new(AccountBalances::new()))
///     .when_event(MoneyDeposited { amount: 40 })
///     .when_event(MoneyDeposited { amount: 2 })
///     .then(|view| view.total() == 42, "total reflects both deposits")
///     .run()
///     .await;
/// ```
pub struct ProcessorScenario<P: EventProcessor> {
    processor: Arc<P>,
    aggregate_id: Uuid,
    next_sequence: u64,
    events: Vec<Event>,
    expectations: Vec<Expectation<P>>,
}

impl<P: EventProcessor> ProcessorScenario<P> {
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            aggregate_id: eventfold::new_id(),
            next_sequence: 0,
            events: Vec::new(),
            expectations: Vec::new(),
        }
    }

    /// Feed a payload, wrapped as the next event of the scenario's
    /// aggregate stream.
    pub fn when_event(mut self, payload: impl EventPayload) -> Self {
        self.next_sequence += 1;
        self.events
            .push(Event::new(self.aggregate_id, self.next_sequence, payload));
        self
    }

    /// Feed a pre-built event (for custom ids, timestamps, correlation).
    pub fn when(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Expect the processor state to satisfy the predicate.
    pub fn then(
        mut self,
        predicate: impl Fn(&P) -> bool + 'static,
        description: impl Into<String>,
    ) -> Self {
        self.expectations.push(Expectation::Processor(
            Box::new(predicate),
            description.into(),
        ));
        self
    }

    /// Expect a handler to have failed with a matching error.
    pub fn then_error(
        mut self,
        matches: impl Fn(&FrameworkError) -> bool + 'static,
        description: impl Into<String>,
    ) -> Self {
        self.expectations
            .push(Expectation::Error(Box::new(matches), description.into()));
        self
    }

    /// Expect every handler to have succeeded.
    pub fn then_no_errors(mut self) -> Self {
        self.expectations.push(Expectation::NoErrors);
        self
    }

    /// Deliver the events in order and assert every expectation.
    pub async fn run(self) {
        let mut errors: Vec<FrameworkError> = Vec::new();
        for event in &self.events {
            if let Err(error) = self.processor.handle(event).await {
                errors.push(error);
            }
        }

        for expectation in &self.expectations {
            match expectation {
                Expectation::Processor(check, description) => {
                    assert!(
                        check(self.processor.as_ref()),
                        "expectation not met: {}",
                        description
                    );
                }
                Expectation::Error(check, description) => {
                    assert!(
                        errors.iter().any(|e| check(e)),
                        "expectation not met: {} (errors: {:?})",
                        description,
                        errors
                    );
                }
                Expectation::NoErrors => {
                    assert!(
                        errors.is_empty(),
                        "expected no handler errors, got: {:?}",
                        errors
                    );
                }
            }
        }
    }
}
