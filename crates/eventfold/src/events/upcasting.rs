// File: src/events/upcasting.rs
//
// Upcasting pipeline: event schema evolution applied on read and/or write

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Event, EventPayload};
use crate::error::{FrameworkError, FrameworkResult};

/// Default bound on upcasting chain length before a cycle is assumed.
pub const DEFAULT_MAX_UPCAST_STEPS: usize = 10;

/// One-step transformation from an older payload schema to a newer one.
///
/// Source and target types are declared explicitly rather than inferred,
/// so the pipeline can index upcasters without reflection. Most upcasters
/// should implement the typed [`PayloadUpcaster`] instead; this object-safe
/// trait exists for the pipeline and for exotic hand-rolled transforms.
pub trait EventUpcaster: Send + Sync {
    fn source_type(&self) -> TypeId;

    fn source_type_name(&self) -> &'static str;

    fn target_type(&self) -> TypeId;

    /// Whether this upcaster applies to the given event. Override for
    /// conditional upcasting, e.g. only events before a cutoff date.
    fn can_upcast(&self, _event: &Event) -> bool {
        true
    }

    /// Transform the event, replacing only the payload. Metadata (id,
    /// aggregate id, sequence number, timestamp) is preserved.
    fn upcast(&self, event: &Event) -> FrameworkResult<Event>;
}

/// Typed upcaster with the transform expressed on concrete payload types.
///
/// ```ignore
/// struct OrderPlacedV1ToV2;
///
/// impl PayloadUpcaster for OrderPlacedV1ToV2 {
///     type Source = OrderPlacedV1;
///     type Target = OrderPlacedV2;
///
///     fn upcast_payload(&self, old: &OrderPlacedV1) -> OrderPlacedV2 {
///         OrderPlacedV2 { product_id: old.product.clone(), price_cents: (old.price * 100.0) as i64 }
///     }
/// }
/// ```
pub trait PayloadUpcaster: Send + Sync + 'static {
    type Source: EventPayload + Clone;
    type Target: EventPayload + Clone;

    fn upcast_payload(&self, source: &Self::Source) -> Self::Target;

    fn applies_to(&self, _event: &Event) -> bool {
        true
    }
}

impl<U: PayloadUpcaster> EventUpcaster for U {
    fn source_type(&self) -> TypeId {
        TypeId::of::<U::Source>()
    }

    fn source_type_name(&self) -> &'static str {
        type_name::<U::Source>()
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<U::Target>()
    }

    fn can_upcast(&self, event: &Event) -> bool {
        self.applies_to(event)
    }

    fn upcast(&self, event: &Event) -> FrameworkResult<Event> {
        let source = event.payload::<U::Source>().ok_or_else(|| {
            FrameworkError::Serialization {
                message: format!(
                    "upcaster {} received payload {} instead of {}",
                    type_name::<U>(),
                    event.payload_name(),
                    type_name::<U::Source>()
                ),
            }
        })?;
        Ok(event.replace_payload(Arc::new(self.upcast_payload(source))))
    }
}

/// Upcasters indexed by their source payload type.
pub struct UpcasterMap {
    by_source: HashMap<TypeId, Vec<Arc<dyn EventUpcaster>>>,
}

impl UpcasterMap {
    pub fn new() -> Self {
        Self {
            by_source: HashMap::new(),
        }
    }

    pub fn from_upcasters(upcasters: impl IntoIterator<Item = Arc<dyn EventUpcaster>>) -> Self {
        let mut map = Self::new();
        for upcaster in upcasters {
            map.register(upcaster);
        }
        map
    }

    pub fn register(&mut self, upcaster: Arc<dyn EventUpcaster>) {
        self.by_source
            .entry(upcaster.source_type())
            .or_default()
            .push(upcaster);
    }

    pub fn for_source(&self, source: TypeId) -> &[Arc<dyn EventUpcaster>] {
        self.by_source
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

impl Default for UpcasterMap {
    fn default() -> Self {
        Self::new()
    }
}

/// When upcasting transformations are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpcastingStrategy {
    /// Transform only when reading from storage; never rewrite. Old events
    /// keep their original schema on disk. The recommended default.
    Lazy,
    /// Transform on read and write, and rewrite upcasted events back to the
    /// store on load, so the store gradually migrates to new schemas.
    Eager,
}

impl UpcastingStrategy {
    pub fn upcast_on_read(&self) -> bool {
        true
    }

    pub fn upcast_on_write(&self) -> bool {
        matches!(self, UpcastingStrategy::Eager)
    }

    pub fn rewrite_on_load(&self) -> bool {
        matches!(self, UpcastingStrategy::Eager)
    }
}

/// Configuration for the upcasting pipeline.
#[derive(Debug, Clone, Copy)]
pub struct UpcastingConfig {
    pub strategy: UpcastingStrategy,
    pub max_steps: usize,
}

impl Default for UpcastingConfig {
    fn default() -> Self {
        Self {
            strategy: UpcastingStrategy::Lazy,
            max_steps: DEFAULT_MAX_UPCAST_STEPS,
        }
    }
}

/// Chain-applying pipeline over an [`UpcasterMap`].
///
/// Multi-step chains (V1→V2→V3) are registered as independent one-step
/// upcasters; [`upcast_chain`](Self::upcast_chain) iterates until the
/// payload type stops changing, bounded by `max_steps`.
pub struct UpcastingPipeline {
    strategy: UpcastingStrategy,
    map: UpcasterMap,
    max_steps: usize,
}

impl UpcastingPipeline {
    pub fn new(config: UpcastingConfig, map: UpcasterMap) -> Self {
        Self {
            strategy: config.strategy,
            map,
            max_steps: config.max_steps,
        }
    }

    pub fn strategy(&self) -> UpcastingStrategy {
        self.strategy
    }

    /// Apply at most one upcasting step: the first registered upcaster for
    /// the payload's type that accepts the event. Returns the event
    /// unchanged when none matches.
    pub fn upcast_event(&self, event: &Event) -> FrameworkResult<Event> {
        for upcaster in self.map.for_source(event.payload_type_id()) {
            if upcaster.can_upcast(event) {
                return upcaster.upcast(event);
            }
        }
        Ok(event.clone())
    }

    /// Apply upcasting steps until the payload type is stable.
    pub fn upcast_chain(&self, event: &Event) -> FrameworkResult<Event> {
        let mut current = event.clone();
        for _ in 0..self.max_steps {
            let before = current.payload_type_id();
            let upcasted = self.upcast_event(&current)?;
            if upcasted.payload_type_id() == before {
                return Ok(upcasted);
            }
            current = upcasted;
        }
        Err(FrameworkError::UpcastingCycle {
            max_steps: self.max_steps,
            payload_type: current.payload_name().to_string(),
        })
    }

    /// Upcast events loaded from the store, if the strategy reads.
    pub fn read_upcast(&self, events: Vec<Event>) -> FrameworkResult<Vec<Event>> {
        if !self.strategy.upcast_on_read() {
            return Ok(events);
        }
        events.iter().map(|e| self.upcast_chain(e)).collect()
    }

    /// Upcast events being written to the store, if the strategy writes.
    pub fn write_upcast(&self, events: Vec<Event>) -> FrameworkResult<Vec<Event>> {
        if !self.strategy.upcast_on_write() {
            return Ok(events);
        }
        events.iter().map(|e| self.upcast_chain(e)).collect()
    }
}
