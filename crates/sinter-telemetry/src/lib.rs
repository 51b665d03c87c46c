//! # sinter-telemetry
//!
//! Event bus for solver telemetry. A session emits structured events
//! (session start, accepted and rejected steps, recoveries, break
//! conditions) that pluggable sinks consume for logging or inspection.
//!
//! Events are notifications only. Nothing in the solver reacts to them.

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::{EventKind, SimulationEvent};
pub use sinks::{EventSink, TracingSink, VecSink};
