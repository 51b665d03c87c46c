//! Output storage interface.
//!
//! Sessions push every recorded state and accepted step into a
//! [`StateStore`]. Pushes are fire-and-forget: a store that fails to
//! persist logs the problem itself and never interrupts a run.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::record::StepRecord;
use crate::state::SystemState;

/// Consumer of simulation output.
pub trait StateStore: Send {
    /// Receives a state of the time series.
    fn store_state(&mut self, state: &SystemState);

    /// Receives the record of an accepted step.
    fn store_step(&mut self, record: &StepRecord);

    /// Called once when the run ends.
    fn finalize(&mut self) {}

    /// Returns a human-readable name for this store.
    fn name(&self) -> &str;
}

/// A store that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl StateStore for NullStore {
    fn store_state(&mut self, _state: &SystemState) {}

    fn store_step(&mut self, _record: &StepRecord) {}

    fn name(&self) -> &str {
        "null_store"
    }
}

#[derive(Debug, Default)]
struct Recorded {
    states: Vec<SystemState>,
    steps: Vec<StepRecord>,
}

/// In-memory store. Clones share the same buffer, so a handle kept by the
/// caller sees what the session pushed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Recorded>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn states(&self) -> Vec<SystemState> {
        self.lock().states.clone()
    }

    pub fn steps(&self) -> Vec<StepRecord> {
        self.lock().steps.clone()
    }

    pub fn state_count(&self) -> usize {
        self.lock().states.len()
    }

    pub fn step_count(&self) -> usize {
        self.lock().steps.len()
    }
}

impl StateStore for InMemoryStore {
    fn store_state(&mut self, state: &SystemState) {
        self.lock().states.push(state.clone());
    }

    fn store_step(&mut self, record: &StepRecord) {
        self.lock().steps.push(record.clone());
    }

    fn name(&self) -> &str {
        "in_memory_store"
    }
}
