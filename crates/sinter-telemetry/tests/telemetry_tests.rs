//! Integration tests for sinter-telemetry.

use sinter_telemetry::bus::EventBus;
use sinter_telemetry::events::{EventKind, SimulationEvent};
use sinter_telemetry::sinks::{TracingSink, VecSink};

fn accepted(timestep: u32) -> SimulationEvent {
    SimulationEvent::new(
        timestep,
        EventKind::StepAccepted {
            sim_time: 0.5,
            step_width: 0.1,
            iterations: 2,
        },
    )
}

// ─── Bus ─────────────────────────────────────────────────

#[test]
fn emit_and_flush() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    bus.emit(accepted(1));
    bus.emit(accepted(2));
    assert!(sink.is_empty(), "events are delivered on flush only");

    bus.flush();
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].timestep, 1);
    assert_eq!(events[1].timestep, 2);
}

#[test]
fn disabled_bus_drops_events() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));
    bus.set_enabled(false);
    assert!(!bus.is_enabled());

    bus.emit(accepted(0));
    bus.flush();
    assert!(sink.is_empty());
}

#[test]
fn multiple_sinks_receive_every_event() {
    let mut bus = EventBus::new();
    let first = VecSink::new();
    let second = VecSink::new();
    bus.add_sink(Box::new(first.clone()));
    bus.add_sink(Box::new(second.clone()));
    bus.add_sink(Box::new(TracingSink::new(tracing::Level::DEBUG)));
    assert_eq!(bus.sink_count(), 3);
    assert_eq!(bus.sink_names(), vec!["vec_sink", "vec_sink", "tracing_sink"]);

    bus.emit(accepted(3));
    bus.finalize();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

#[test]
fn publish_stamps_current_step() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    bus.publish(EventKind::BreakConditionMet {
        condition: "pore_closure".into(),
    });
    bus.set_step(7);
    assert_eq!(bus.step(), 7);
    bus.publish(EventKind::BreakConditionMet {
        condition: "stalled_progress".into(),
    });

    assert_eq!(bus.flush(), 2);
    assert_eq!(bus.flush(), 0);
    assert_eq!(bus.delivered(), 2);
    let stamps: Vec<u32> = sink.events().iter().map(|e| e.timestep).collect();
    assert_eq!(stamps, vec![0, 7]);
}

// ─── Events ──────────────────────────────────────────────

#[test]
fn event_serialization() {
    let event = SimulationEvent::new(
        5,
        EventKind::StateRecovered {
            sim_time: 12.0,
            attempts: 2,
            step_width_cap: 0.25,
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    let recovered: SimulationEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(recovered.timestep, 5);
    assert_eq!(recovered.kind, event.kind);
}

#[test]
fn event_names() {
    let rejected = SimulationEvent::new(
        0,
        EventKind::StepRejected {
            validator: "oscillation".into(),
            reason: "alternating run of 6".into(),
        },
    );
    assert_eq!(rejected.name(), "step_rejected");

    let finished = SimulationEvent::new(
        9,
        EventKind::SessionFinished {
            success: true,
            accepted_steps: 9,
            rejected_steps: 1,
        },
    );
    let json = serde_json::to_string(&finished).unwrap();
    assert!(json.contains("accepted_steps"));

    let sink = VecSink::new();
    let mut handle = sink.clone();
    sinter_telemetry::EventSink::handle(&mut handle, &rejected);
    sinter_telemetry::EventSink::handle(&mut handle, &finished);
    assert_eq!(sink.count("step_rejected"), 1);
    assert_eq!(sink.count("session_finished"), 1);
}
