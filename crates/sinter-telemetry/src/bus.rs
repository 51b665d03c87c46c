//! Event bus for session notifications.
//!
//! Events are stamped with the accepted-step count of the session and
//! queued on an `mpsc` channel; the session drains the queue into its
//! sinks between steps, so sinks never run inside the step itself.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::events::{EventKind, SimulationEvent};
use crate::sinks::EventSink;

/// Queue of session events and the sinks that consume them.
pub struct EventBus {
    sender: Sender<SimulationEvent>,
    receiver: Receiver<SimulationEvent>,
    sinks: Vec<Box<dyn EventSink>>,
    enabled: bool,
    step: u32,
    delivered: u64,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            sinks: Vec::new(),
            enabled: true,
            step: 0,
            delivered: 0,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// A disabled bus drops everything it is given.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the step stamped onto events passed to [`publish`](Self::publish).
    pub fn set_step(&mut self, step: u32) {
        self.step = step;
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Queues `kind` stamped with the current step.
    pub fn publish(&self, kind: EventKind) {
        self.emit(SimulationEvent::new(self.step, kind));
    }

    /// Queues a pre-stamped event.
    pub fn emit(&self, event: SimulationEvent) {
        if self.enabled {
            // The bus owns the receiver, so the channel is never closed here.
            let _ = self.sender.send(event);
        }
    }

    /// Hands every queued event to every sink, in queue then registration
    /// order. Returns the number of events drained.
    pub fn flush(&mut self) -> usize {
        let mut drained = 0;
        for event in self.receiver.try_iter() {
            for sink in &mut self.sinks {
                sink.handle(&event);
            }
            drained += 1;
        }
        self.delivered += drained as u64;
        drained
    }

    /// Drains the queue, then lets every sink finish.
    pub fn finalize(&mut self) {
        self.flush();
        for sink in &mut self.sinks {
            sink.finalize();
        }
    }

    /// Events drained since the bus was created.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
