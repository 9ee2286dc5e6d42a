// File: src/aggregate_scenario.rs
//
// Given/when/then harness for aggregates

use eventfold::{
    Aggregate, AggregateCell, AggregateRoutes, Command, CommandEnvelope, Event, EventPayload,
    FrameworkError,
};
use uuid::Uuid;

enum Expectation<A> {
    Events(Box<dyn Fn(&[Event]) -> bool>, String),
    Error(Box<dyn Fn(&FrameworkError) -> bool>, String),
    State(Box<dyn Fn(&A) -> bool>, String),
}

/// Scenario-style test harness for one aggregate instance.
///
/// Seed the aggregate with past events (`given`), handle commands
/// (`when`), and assert on the emitted events, the final state, and any
/// handler errors (`then_*`). [`run`](Self::run) executes the scenario and
/// panics with the first unmet expectation.
///
/// ```ignore
/// AggregateScenario::<BankAccount>::new()
///     .given(AccountOpened { owner: "Alice".into() })
///     .when(DepositMoney { account_id, amount: 100 })
///     .then_emits(MoneyDeposited { amount: 100 })
///     .then_state(|account| account.balance == 100)
///     .run();
/// ```
pub struct AggregateScenario<A: Aggregate> {
    aggregate_id: Uuid,
    given: Vec<Box<dyn EventPayload>>,
    commands: Vec<CommandEnvelope>,
    expectations: Vec<Expectation<A>>,
}

impl<A: Aggregate> AggregateScenario<A> {
    pub fn new() -> Self {
        Self::with_id(eventfold::new_id())
    }

    /// Use a fixed aggregate id, for commands that must address it.
    pub fn with_id(aggregate_id: Uuid) -> Self {
        Self {
            aggregate_id,
            given: Vec::new(),
            commands: Vec::new(),
            expectations: Vec::new(),
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    /// Seed a past event payload, applied before any command runs.
    pub fn given(mut self, payload: impl EventPayload) -> Self {
        self.given.push(Box::new(payload));
        self
    }

    /// Handle a command. Multiple `when`s run in order; handler errors are
    /// collected for `then_error` rather than aborting the scenario.
    pub fn when(mut self, command: impl Command) -> Self {
        self.commands.push(CommandEnvelope::new(command));
        self
    }

    /// Expect an emitted event with exactly this payload.
    pub fn then_emits<T>(mut self, expected: T) -> Self
    where
        T: EventPayload + PartialEq,
    {
        let description = format!("should emit {:?}", expected);
        self.expectations.push(Expectation::Events(
            Box::new(move |events| {
                events
                    .iter()
                    .any(|e| e.payload::<T>().is_some_and(|p| *p == expected))
            }),
            description,
        ));
        self
    }

    /// Expect at least one emitted event carrying a payload of type `T`.
    pub fn then_emits_event_of<T: EventPayload>(mut self) -> Self {
        self.expectations.push(Expectation::Events(
            Box::new(|events| events.iter().any(|e| e.payload_is::<T>())),
            format!("should emit an event of type {}", std::any::type_name::<T>()),
        ));
        self
    }

    /// Expect no events at all.
    pub fn then_no_events(mut self) -> Self {
        self.expectations.push(Expectation::Events(
            Box::new(|events| events.is_empty()),
            "should not emit any events".to_string(),
        ));
        self
    }

    /// Expect some handler to have failed with an error matching the
    /// predicate.
    pub fn then_error(
        mut self,
        matches: impl Fn(&FrameworkError) -> bool + 'static,
        description: impl Into<String>,
    ) -> Self {
        self.expectations
            .push(Expectation::Error(Box::new(matches), description.into()));
        self
    }

    /// Expect the final aggregate state to satisfy the predicate.
    pub fn then_state(
        mut self,
        predicate: impl Fn(&A) -> bool + 'static,
    ) -> Self {
        self.expectations.push(Expectation::State(
            Box::new(predicate),
            "final state should match predicate".to_string(),
        ));
        self
    }

    /// Execute the scenario and assert every expectation.
    ///
    /// Panics with the unmet expectation's description, test-assertion
    /// style.
    pub fn run(self) {
        let mut routes = AggregateRoutes::new();
        A::configure(&mut routes);

        let mut aggregate = A::new(self.aggregate_id);
        for payload in &self.given {
            routes.dispatch_apply(&mut aggregate, payload.as_ref());
            let root = aggregate.root_mut();
            root.version += 1;
        }

        let mut errors: Vec<FrameworkError> = Vec::new();
        for command in &self.commands {
            let mut cell = AggregateCell::new(&mut aggregate, &routes);
            if let Err(error) = cell.handle(command) {
                errors.push(error);
            }
        }

        let emitted: Vec<Event> = aggregate.root().uncommitted_events().to_vec();

        for expectation in &self.expectations {
            match expectation {
                Expectation::Events(check, description) => {
                    assert!(
                        check(&emitted),
                        "expectation not met: {} (emitted: {:?})",
                        description,
                        emitted.iter().map(Event::payload_name).collect::<Vec<_>>()
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
                Expectation::State(check, description) => {
                    assert!(check(&aggregate), "expectation not met: {}", description);
                }
            }
        }
    }
}

impl<A: Aggregate> Default for AggregateScenario<A> {
    fn default() -> Self {
        Self::new()
    }
}
