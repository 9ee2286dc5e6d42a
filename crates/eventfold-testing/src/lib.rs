// File: src/lib.rs
//
// eventfold-testing: scenario helpers for aggregates and processors

//! Given/when/then test harnesses for `eventfold` applications.
//!
//! [`AggregateScenario`] seeds an aggregate with past events, handles
//! commands against it, and asserts on emitted events, errors, and final
//! state. [`ProcessorScenario`] feeds events through a processor or
//! projection and asserts on its resulting state.

pub mod aggregate_scenario;
pub mod processor_scenario;

pub use aggregate_scenario::AggregateScenario;
pub use processor_scenario::ProcessorScenario;
