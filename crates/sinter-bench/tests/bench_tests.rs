//! Integration tests for sinter-bench.

use approx::assert_relative_eq;
use sinter_bench::metrics::{mean_center_distance, mean_neck_width, BenchmarkMetrics};
use sinter_bench::runner::BenchmarkRunner;
use sinter_bench::scenarios::{Scenario, ScenarioKind};
use sinter_material::MaterialDatabase;
use sinter_model::generators::{circle_particle, two_particle_neck, ClusterResolution};
use sinter_solver::{SolverConfig, StepWidthConfig, StepWidthMode};
use sinter_types::MaterialId;

/// Scenario shortened to three fixed steps.
fn quick(kind: ScenarioKind) -> Scenario {
    let config = SolverConfig {
        step_width: StepWidthConfig {
            mode: StepWidthMode::Fixed,
            fixed: 1.0e-5,
            ..Default::default()
        },
        ..Default::default()
    };
    Scenario::from_kind(kind)
        .unwrap()
        .with_config(config)
        .with_normalized_duration(3.0e-5)
}

// ─── Scenario Tests ───────────────────────────────────────────

#[test]
fn two_particle_setup() {
    let s = Scenario::two_particle_neck().unwrap();
    assert_eq!(s.kind, ScenarioKind::TwoParticleNeck);
    assert_eq!(s.state.particle_count(), 2);
    s.state.require_contacts().unwrap();
}

#[test]
fn three_particle_setup() {
    let s = Scenario::three_particle_pore().unwrap();
    assert_eq!(s.kind, ScenarioKind::ThreeParticlePore);
    assert_eq!(s.state.particle_count(), 3);
}

#[test]
fn all_scenarios() {
    assert_eq!(ScenarioKind::all().len(), 2);
    for &kind in ScenarioKind::all() {
        assert_eq!(ScenarioKind::from_name(kind.name()), Some(kind));
    }
    assert_eq!(ScenarioKind::from_name("hexagon"), None);
}

#[test]
fn duration_scales_with_characteristic_time() {
    let s = Scenario::two_particle_neck()
        .unwrap()
        .with_normalized_duration(2.0);
    let input = s.session_input().unwrap();
    assert_relative_eq!(
        input.conditions.duration,
        2.0 * s.norm().unwrap().time,
        max_relative = 1e-12
    );
}

#[test]
fn material_swap_changes_time_scale() {
    let db = MaterialDatabase::with_defaults();
    let alumina = Scenario::two_particle_neck().unwrap();
    let copper = Scenario::two_particle_neck()
        .unwrap()
        .with_material(db.get("copper").unwrap().clone());
    assert_ne!(alumina.norm().unwrap().time, copper.norm().unwrap().time);
}

// ─── Geometry Measure Tests ───────────────────────────────────

#[test]
fn neck_width_of_generated_pair() {
    // Circles of radius 1 with centers 1.8 apart meet on a chord of
    // half-length sqrt(1 - 0.81).
    let state =
        two_particle_neck(1.0, 1.8, ClusterResolution::for_radius(1.0, 48), MaterialId(0)).unwrap();
    let width = mean_neck_width(&state).unwrap();
    assert_relative_eq!(width, 2.0 * 0.19f64.sqrt(), max_relative = 1e-9);
    assert_relative_eq!(mean_center_distance(&state).unwrap(), 1.8, max_relative = 1e-12);
}

#[test]
fn free_particle_has_no_neck() {
    let state = circle_particle(1.0, 12, MaterialId(0)).unwrap();
    assert!(mean_neck_width(&state).is_none());
    assert!(mean_center_distance(&state).is_none());
}

// ─── Runner Tests ─────────────────────────────────────────────

#[test]
fn run_two_particle_neck() {
    let metrics = BenchmarkRunner::run(&quick(ScenarioKind::TwoParticleNeck)).unwrap();
    assert_eq!(metrics.scenario, "two_particle_neck");
    assert!(metrics.success);
    assert!(metrics.accepted_steps >= 3);
    assert!(metrics.total_wall_time > 0.0);
    assert!(metrics.neck_growth > 0.0, "neck growth {}", metrics.neck_growth);
    assert!(metrics.shrinkage >= -1e-9, "shrinkage {}", metrics.shrinkage);
}

#[test]
fn batch_keeps_order() {
    let scenarios: Vec<Scenario> = ScenarioKind::all().iter().map(|&k| quick(k)).collect();
    let results = BenchmarkRunner::run_batch(&scenarios);
    assert_eq!(results.len(), scenarios.len());
    for (result, scenario) in results.iter().zip(&scenarios) {
        let metrics = result.as_ref().unwrap();
        assert_eq!(metrics.scenario, scenario.kind.name());
        assert_eq!(metrics.particle_count, scenario.state.particle_count());
        assert!(metrics.success, "{} failed", metrics.scenario);
    }
}

#[test]
fn invalid_config_fails_before_running() {
    let mut scenario = quick(ScenarioKind::TwoParticleNeck);
    scenario.config.remembered_state_count = 0;
    assert!(BenchmarkRunner::run(&scenario).is_err());
}

// ─── Metrics Tests ────────────────────────────────────────────

fn sample_metrics() -> BenchmarkMetrics {
    BenchmarkMetrics {
        scenario: "test".into(),
        particle_count: 2,
        node_count: 130,
        success: true,
        termination: "EndTimeReached".into(),
        accepted_steps: 100,
        rejected_steps: 3,
        recoveries: 3,
        avg_iterations: 1.0,
        simulated_time: 3.6e3,
        total_wall_time: 1.5,
        avg_step_time: 0.015,
        neck_growth: 0.25,
        shrinkage: 0.01,
    }
}

#[test]
fn metrics_csv_output() {
    let csv = BenchmarkMetrics::to_csv(&[sample_metrics(), sample_metrics()]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("scenario,"));
    let header_fields = lines[0].split(',').count();
    for row in &lines[1..] {
        assert_eq!(row.split(',').count(), header_fields);
        assert!(row.starts_with("test,2,130,true,100,3,3,"));
    }
    assert!(lines[1].contains("15.0000"));
}

#[test]
fn metrics_json_round_trip() {
    let json = serde_json::to_string(&sample_metrics()).unwrap();
    let back: BenchmarkMetrics = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sample_metrics());
}
