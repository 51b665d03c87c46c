//! Pluggable event sinks.
//!
//! Sinks consume events from the bus and process them (log through
//! `tracing`, collect in memory for inspection, and so on).

use std::sync::{Arc, Mutex};

use crate::events::{EventKind, SimulationEvent};

/// Trait for event consumers.
///
/// Implement this to create custom telemetry outputs.
pub trait EventSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &SimulationEvent);

    /// Called when the session ends. Flush buffers, close files, etc.
    fn finalize(&mut self) {}

    /// Returns a human-readable name for this sink.
    fn name(&self) -> &str;
}

/// A sink that collects events in memory.
///
/// Clones share the same buffer, so a test can keep one handle and give
/// the other to a bus.
#[derive(Clone, Default)]
pub struct VecSink {
    events: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl VecSink {
    /// Creates an empty vec sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events.
    pub fn events(&self) -> Vec<SimulationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of collected events.
    pub fn len(&self) -> usize {
        match self.events.lock() {
            Ok(events) => events.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of collected events with the given kind name.
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &SimulationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// A sink that logs events using the `tracing` crate.
///
/// Rejections and recoveries are always logged at `WARN`; everything else
/// uses the configured level.
pub struct TracingSink {
    level: tracing::Level,
}

impl TracingSink {
    /// Creates a new tracing sink at the given log level.
    pub fn new(level: tracing::Level) -> Self {
        Self { level }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new(tracing::Level::INFO)
    }
}

impl EventSink for TracingSink {
    fn handle(&mut self, event: &SimulationEvent) {
        if matches!(
            event.kind,
            EventKind::StepRejected { .. } | EventKind::StateRecovered { .. }
        ) {
            tracing::warn!(timestep = event.timestep, event = ?event.kind, "simulation_event");
            return;
        }
        match self.level {
            tracing::Level::TRACE => {
                tracing::trace!(timestep = event.timestep, event = ?event.kind, "simulation_event")
            }
            tracing::Level::DEBUG => {
                tracing::debug!(timestep = event.timestep, event = ?event.kind, "simulation_event")
            }
            tracing::Level::INFO => {
                tracing::info!(timestep = event.timestep, event = ?event.kind, "simulation_event")
            }
            tracing::Level::WARN => {
                tracing::warn!(timestep = event.timestep, event = ?event.kind, "simulation_event")
            }
            _ => {
                tracing::error!(timestep = event.timestep, event = ?event.kind, "simulation_event")
            }
        }
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}
