//! Bounded state history and rollback after rejected steps.

use std::collections::VecDeque;

use sinter_model::SystemState;
use sinter_types::{SinterError, SinterResult};

/// The last accepted states, newest at the back.
#[derive(Debug, Clone)]
pub struct StateHistory {
    capacity: usize,
    states: VecDeque<SystemState>,
}

impl StateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            states: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Pushes a state, evicting the oldest one at capacity.
    pub fn remember(&mut self, state: SystemState) {
        if self.states.len() == self.capacity {
            self.states.pop_front();
        }
        self.states.push_back(state);
    }

    pub fn newest(&self) -> Option<&SystemState> {
        self.states.back()
    }

    pub fn pop(&mut self) -> Option<SystemState> {
        self.states.pop_back()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Rollback policy over a [`StateHistory`].
///
/// The k-th consecutive rejection restores the k-th newest remembered
/// state, or the oldest one if fewer are remembered. Rejection number
/// `capacity + 1` in a row is fatal.
#[derive(Debug, Clone)]
pub struct Recoverer {
    history: StateHistory,
    failures: u32,
}

impl Recoverer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: StateHistory::new(capacity),
            failures: 0,
        }
    }

    /// Remembers an accepted state and clears the failure streak.
    pub fn remember(&mut self, state: SystemState) {
        self.history.remember(state);
        self.failures = 0;
    }

    /// Consecutive rejections since the last accepted state.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    /// State to retry from after a rejection at `time`.
    pub fn recover(&mut self, time: f64) -> SinterResult<SystemState> {
        self.failures += 1;
        let exhausted = SinterError::RecoveryFailed {
            time,
            attempts: self.failures,
        };
        if self.failures as usize > self.history.capacity() {
            return Err(exhausted);
        }
        if self.failures > 1 && self.history.len() > 1 {
            self.history.pop();
        }
        self.history.newest().cloned().ok_or(exhausted)
    }
}
