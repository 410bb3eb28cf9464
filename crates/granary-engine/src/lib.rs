//! The Granary load engine — dimension versioner, surrogate key resolver,
//! fact loader, and the batch coordinator, generic over any
//! [`WarehouseStore`](granary_core::store::WarehouseStore) backend.
//!
//! Data flows one direction: source feed → change detection → versioning →
//! surrogate key resolution → fact loading → durable store. The coordinator
//! in [`batch`] wraps the whole run.

pub mod batch;
pub mod loader;
pub mod resolver;
pub mod versioner;

/// Tuning knobs for the engine. Constructed once per process and passed in
/// explicitly; there is no global state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// How many times a version write is retried against fresh state after a
  /// concurrent-writer conflict before the key is given up on.
  pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
  fn default() -> Self { Self { max_conflict_retries: 3 } }
}

/// The load engine. Cheap to clone whenever the store is.
#[derive(Clone)]
pub struct Engine<S> {
  store:  S,
  config: EngineConfig,
}

impl<S> Engine<S> {
  pub fn new(store: S, config: EngineConfig) -> Self { Self { store, config } }

  /// Direct store access for reads (history queries, reporting).
  pub fn store(&self) -> &S { &self.store }
}
