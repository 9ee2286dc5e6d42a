// File: src/processing/conditions.rs
//
// Lag metrics and the conditions that trigger catchup

use chrono::Duration;

/// How far a processor is behind the write side, in two dimensions:
/// backlog volume and event staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lag {
    /// Events queued but not yet processed (subscription depth).
    pub unprocessed_events: usize,
    /// Mean age of the events dispatched in the last batch.
    pub average_event_age: Duration,
}

impl Lag {
    pub fn average_age_is_older_than(&self, age: Duration) -> bool {
        self.average_event_age > age
    }

    pub fn unprocessed_events_is_greater_than(&self, n: usize) -> bool {
        self.unprocessed_events > n
    }
}

/// Composable predicate over [`Lag`] deciding when a catchup strategy
/// should run.
#[derive(Debug, Clone)]
pub enum CatchupCondition {
    /// Catchup disabled.
    Never,
    /// Trigger when the backlog exceeds `n` events.
    AfterNEvents(usize),
    /// Trigger when the average event age exceeds the given duration.
    AfterNAge(Duration),
    /// OR over child conditions.
    AnyOf(Vec<CatchupCondition>),
    /// AND over child conditions.
    AllOf(Vec<CatchupCondition>),
}

impl CatchupCondition {
    pub fn should_catchup(&self, lag: &Lag) -> bool {
        match self {
            CatchupCondition::Never => false,
            CatchupCondition::AfterNEvents(n) => lag.unprocessed_events_is_greater_than(*n),
            CatchupCondition::AfterNAge(age) => lag.average_age_is_older_than(*age),
            CatchupCondition::AnyOf(conditions) => {
                conditions.iter().any(|c| c.should_catchup(lag))
            }
            CatchupCondition::AllOf(conditions) => {
                conditions.iter().all(|c| c.should_catchup(lag))
            }
        }
    }
}
