// File: src/processing/config.rs
//
// Per-processor-type execution configuration with a default fallback

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use super::conditions::CatchupCondition;
use super::processor::EventProcessor;
use super::strategies::{CatchupStrategy, NoCatchup};

/// How an executor drives one processor: batch size, when to catch up,
/// and how.
#[derive(Clone)]
pub struct ProcessorExecutionConfig {
    pub batch_size: usize,
    pub condition: CatchupCondition,
    pub strategy: Arc<dyn CatchupStrategy>,
}

impl ProcessorExecutionConfig {
    pub fn new(
        batch_size: usize,
        condition: CatchupCondition,
        strategy: Arc<dyn CatchupStrategy>,
    ) -> Self {
        Self {
            batch_size,
            condition,
            strategy,
        }
    }
}

impl Default for ProcessorExecutionConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            condition: CatchupCondition::Never,
            strategy: Arc::new(NoCatchup),
        }
    }
}

/// Registry mapping processor types to execution configurations, with a
/// default for types without an override.
#[derive(Clone, Default)]
pub struct ProcessorConfigRegistry {
    default: ProcessorExecutionConfig,
    overrides: HashMap<TypeId, ProcessorExecutionConfig>,
}

impl ProcessorConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, config: ProcessorExecutionConfig) {
        self.default = config;
    }

    pub fn register<P: EventProcessor + 'static>(&mut self, config: ProcessorExecutionConfig) {
        self.overrides.insert(TypeId::of::<P>(), config);
    }

    pub fn get<P: EventProcessor + 'static>(&self) -> ProcessorExecutionConfig {
        self.get_for(TypeId::of::<P>())
    }

    /// Configuration for a processor instance, via its concrete type id.
    pub fn get_for(&self, processor_type: TypeId) -> ProcessorExecutionConfig {
        self.overrides
            .get(&processor_type)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
