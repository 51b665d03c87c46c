//! Integration tests for sinter-solver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use sinter_material::{MaterialDatabase, MaterialTable, ProcessConditions};
use sinter_math::root::finite_difference_jacobian;
use sinter_math::{
    BroydenRootFinder, NewtonRootFinder, ResidualFunction, RootFinder, RootFinderOptions,
};
use sinter_model::generators::{
    circle_particle, three_particle_pore, two_particle_neck, ClusterResolution,
};
use sinter_model::{InMemoryStore, NodeKind, StepRecord, SystemState};
use sinter_solver::breaks::{BreakContext, PoreClosureCondition, StalledProgressCondition};
use sinter_solver::validator::alternating_run;
use sinter_solver::{
    BreakCondition, CancellationToken, FiniteValuesValidator, FourStageStepper, InvalidStep,
    NeckRetreatValidator, NodeUnknown, Norm, OscillationValidator, Progress, ProgressHook,
    Recoverer, SessionBuilder, SessionHook, SessionInput, SolverConfig, StepContext,
    StepProposal, StepValidator, StepWidthConfig, StepWidthController, StepWidthMode,
    TepEvaluator, Termination, TimeStepper, TrapezoidalStepper, UnknownKey, UnknownLayout,
    UnknownVector,
};
use sinter_telemetry::VecSink;
use sinter_types::{MaterialId, NodeId, ParticleId, SinterError, SinterResult};

const RADIUS: f64 = 1.0e-6;
const TEMPERATURE: f64 = 1600.0;

fn alumina() -> MaterialTable {
    let db = MaterialDatabase::with_defaults();
    MaterialTable::single(db.get("alumina").unwrap().clone())
}

fn neck_state() -> SystemState {
    let resolution = ClusterResolution::for_radius(RADIUS, 40);
    two_particle_neck(RADIUS, 1.8 * RADIUS, resolution, MaterialId(0)).unwrap()
}

fn time_scale(state: &SystemState) -> f64 {
    let conditions = ProcessConditions::new(TEMPERATURE, 1.0);
    Norm::from_reference(state, &alumina(), &conditions)
        .unwrap()
        .time
}

/// Input running for `normalized_duration` reference times.
fn input(state: SystemState, normalized_duration: f64, config: SolverConfig) -> SessionInput {
    let duration = normalized_duration * time_scale(&state);
    SessionInput {
        state,
        materials: alumina(),
        conditions: ProcessConditions::new(TEMPERATURE, duration),
        config,
    }
}

fn fixed_width(width: f64) -> SolverConfig {
    SolverConfig {
        step_width: StepWidthConfig {
            mode: StepWidthMode::Fixed,
            fixed: width,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Normalized state and evaluator of a fixture.
fn evaluator_for(state: &SystemState) -> (SystemState, TepEvaluator) {
    let conditions = ProcessConditions::new(TEMPERATURE, 1.0);
    let materials = alumina();
    let norm = Norm::from_reference(state, &materials, &conditions).unwrap();
    let normalized = norm.normalize_state(state).unwrap();
    let kinetics = norm.normalize_materials(&materials, &conditions).unwrap();
    let layout = Arc::new(UnknownLayout::from_state(&normalized).unwrap());
    let evaluator = TepEvaluator::new(&normalized, layout, &kinetics, 1.0e-3).unwrap();
    (normalized, evaluator)
}

fn neck_width(state: &SystemState) -> f64 {
    let particle = &state.particles()[0];
    let necks: Vec<_> = particle
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, n)| n.kind == NodeKind::Neck)
        .map(|(i, _)| particle.node_position_at(i))
        .collect();
    assert_eq!(necks.len(), 2);
    necks[0].distance(necks[1])
}

fn center_distance(state: &SystemState) -> f64 {
    let p = state.particles();
    p[0].center_position().distance(p[1].center_position())
}

// ─── Layout Tests ─────────────────────────────────────────────

#[test]
fn layout_is_a_bijection() {
    let state = neck_state();
    let layout = UnknownLayout::from_state(&state).unwrap();
    assert_eq!(
        layout.len(),
        1 + 3 * state.particle_count() + 4 * state.node_count()
    );

    let mut seen = HashSet::new();
    for index in 0..layout.len() {
        let key = layout.key_at(index).unwrap();
        assert_eq!(layout.index_of(key), Some(index));
        assert!(seen.insert(key), "key {key:?} appears twice");
    }
    assert!(layout.key_at(layout.len()).is_none());
}

#[test]
fn layout_is_deterministic() {
    let state = neck_state();
    let a = UnknownLayout::from_state(&state).unwrap();
    let b = UnknownLayout::from_state(&state).unwrap();
    assert_eq!(a, b);
    assert!(a.matches(&state));

    let first_node = state.particles()[0].nodes()[0].id;
    assert_eq!(
        a.key_at(a.node_offset()),
        Some(UnknownKey::Node(first_node, NodeUnknown::Normal))
    );
    assert_eq!(a.particle_slot(ParticleId(1)), Some(1));
}

#[test]
fn layout_rejects_duplicates() {
    let err = UnknownLayout::build(vec![ParticleId(0)], vec![NodeId(1), NodeId(1)]).unwrap_err();
    assert!(matches!(err, SinterError::LayoutMismatch(_)));
    assert!(err.is_structural());
}

#[test]
fn layout_detects_population_change() {
    let layout = UnknownLayout::from_state(&neck_state()).unwrap();
    let other = circle_particle(RADIUS, 12, MaterialId(0)).unwrap();
    assert!(!layout.matches(&other));
}

// ─── UnknownVector Tests ──────────────────────────────────────

#[test]
fn vector_arithmetic_keeps_layout() {
    let state = circle_particle(1.0, 6, MaterialId(0)).unwrap();
    let layout = Arc::new(UnknownLayout::from_state(&state).unwrap());
    let n = layout.len();
    let a = UnknownVector::from_values(Arc::clone(&layout), vec![1.0; n]).unwrap();
    let b = UnknownVector::from_values(Arc::clone(&layout), (0..n).map(|i| i as f64).collect())
        .unwrap();

    let sum = a.try_add(&b).unwrap();
    assert_eq!(sum.values()[3], 4.0);
    let diff = sum.try_sub(&a).unwrap();
    assert_eq!(diff.values(), b.values());

    let mut c = a.scaled(2.0);
    c.axpy(-2.0, &a).unwrap();
    assert!(c.values().iter().all(|&v| v == 0.0));

    let avg = UnknownVector::weighted_sum(&[(0.5, &a), (0.5, &b)]).unwrap();
    assert_relative_eq!(avg.values()[5], 3.0);
}

#[test]
fn vector_refuses_mismatched_layouts() {
    let small = circle_particle(1.0, 6, MaterialId(0)).unwrap();
    let large = circle_particle(1.0, 8, MaterialId(0)).unwrap();
    let a = UnknownVector::zeros(Arc::new(UnknownLayout::from_state(&small).unwrap()));
    let b = UnknownVector::zeros(Arc::new(UnknownLayout::from_state(&large).unwrap()));
    assert!(matches!(a.try_add(&b), Err(SinterError::LayoutMismatch(_))));

    let layout = Arc::clone(a.layout());
    assert!(UnknownVector::from_values(layout, vec![0.0; 3]).is_err());
}

#[test]
fn vector_node_access() {
    let state = circle_particle(1.0, 6, MaterialId(0)).unwrap();
    let layout = Arc::new(UnknownLayout::from_state(&state).unwrap());
    let mut v = UnknownVector::zeros(layout);
    let id = state.particles()[0].nodes()[2].id;
    v.set_node(id, NodeUnknown::Normal, -3.0).unwrap();
    assert_eq!(v.node(id, NodeUnknown::Normal), Some(-3.0));
    assert_eq!(v.node_at(2, NodeUnknown::Normal), -3.0);
    assert_eq!(v.max_abs_node(NodeUnknown::Normal), 3.0);
    assert!(v.set_node(NodeId(999), NodeUnknown::Flux, 1.0).is_err());
}

// ─── Norm Tests ───────────────────────────────────────────────

#[test]
fn normalization_round_trip() {
    let state = neck_state().with_time(3.5e4);
    let conditions = ProcessConditions::new(TEMPERATURE, 1.0);
    let norm = Norm::from_reference(&state, &alumina(), &conditions).unwrap();
    let back = norm
        .denormalize_state(&norm.normalize_state(&state).unwrap())
        .unwrap();

    assert_relative_eq!(back.time(), state.time(), max_relative = 1e-10);
    for (a, b) in state.particles().iter().zip(back.particles()) {
        assert_relative_eq!(a.center.r, b.center.r, max_relative = 1e-10);
        assert_eq!(a.center.phi, b.center.phi);
        assert_eq!(a.rotation, b.rotation);
        for (m, n) in a.nodes().iter().zip(b.nodes()) {
            assert_relative_eq!(m.coordinates.r, n.coordinates.r, max_relative = 1e-10);
            assert_eq!(m.coordinates.phi, n.coordinates.phi);
        }
    }
}

#[test]
fn reference_particle_has_unit_radius() {
    let state = neck_state();
    let conditions = ProcessConditions::new(TEMPERATURE, 1.0);
    let materials = alumina();
    let norm = Norm::from_reference(&state, &materials, &conditions).unwrap();
    let normalized = norm.normalize_state(&state).unwrap();
    assert_relative_eq!(
        normalized.particles()[0].mean_node_radius(),
        1.0,
        max_relative = 1e-12
    );

    let kinetics = norm.normalize_materials(&materials, &conditions).unwrap();
    let surface = kinetics.surface(MaterialId(0)).unwrap();
    assert_relative_eq!(surface.energy, 1.0);
    assert_relative_eq!(surface.mobility, 1.0, max_relative = 1e-12);
    let alumina = materials.material(MaterialId(0)).unwrap();
    let boundary = kinetics.interface(MaterialId(0), MaterialId(0)).unwrap();
    assert_relative_eq!(
        boundary.energy,
        alumina.grain_boundary_energy / alumina.surface_energy,
        max_relative = 1e-12
    );
    assert!(kinetics.interface(MaterialId(0), MaterialId(7)).is_err());
}

#[test]
fn time_scale_formula() {
    let state = neck_state();
    let conditions = ProcessConditions::new(TEMPERATURE, 1.0);
    let materials = alumina();
    let m = materials.material(MaterialId(0)).unwrap();
    let norm = Norm::from_reference(&state, &materials, &conditions).unwrap();
    let l = norm.length;
    let mobility = m.vacancy_concentration * m.molar_volume * m.surface_diffusion_coefficient
        / conditions.thermal_energy();
    let expected = l.powi(4) / (mobility * m.surface_energy);
    assert_relative_eq!(norm.time, expected, max_relative = 1e-12);
    assert_relative_eq!(norm.energy, m.surface_energy * l * l, max_relative = 1e-12);
}

// ─── Evaluator Tests ──────────────────────────────────────────

#[test]
fn jacobian_matches_finite_differences() {
    let (_, evaluator) = evaluator_for(&neck_state());
    let n = evaluator.dimension();
    let x: Vec<f64> = (0..n).map(|i| 0.3 * (i as f64 * 0.7).sin()).collect();

    let analytic = evaluator.jacobian(&x).unwrap();
    let numeric = finite_difference_jacobian(&evaluator, &x).unwrap();
    for (row, col, value) in numeric.triplets() {
        let exact = analytic.get(row, col);
        assert!(
            (exact - value).abs() < 1e-5 * value.abs().max(1.0),
            "J[{row},{col}]: analytic {exact}, numeric {value}"
        );
    }
    for (row, col, value) in analytic.triplets() {
        let approx = numeric.get(row, col);
        assert!((approx - value).abs() < 1e-5 * value.abs().max(1.0));
    }
}

#[test]
fn newton_solves_the_stationarity_system() {
    let (normalized, evaluator) = evaluator_for(&neck_state());
    let newton = NewtonRootFinder::new(RootFinderOptions::default());
    let solution = newton
        .find_root(&evaluator, vec![0.0; evaluator.dimension()])
        .unwrap();
    assert!(solution.residual_norm <= 1e-9);
    assert!(solution.iterations <= 3);

    // Contacting nodes move together.
    let rates = UnknownVector::from_values(Arc::clone(evaluator.layout()), solution.x).unwrap();
    let next = sinter_solver::advance(&normalized, &rates, 1e-4).unwrap();
    for pair in sinter_model::contact_pairs(&next) {
        let a = next.node_position(pair.primary).unwrap();
        let b = next.node_position(pair.secondary).unwrap();
        assert!(a.distance(b) < 1e-12);
    }
}

#[test]
fn free_circle_conserves_volume_and_stays_put() {
    let state = circle_particle(RADIUS, 24, MaterialId(0)).unwrap();
    let (_, evaluator) = evaluator_for(&state);
    let newton = NewtonRootFinder::new(RootFinderOptions::default());
    let solution = newton
        .find_root(&evaluator, vec![0.0; evaluator.dimension()])
        .unwrap();
    let rates = UnknownVector::from_values(Arc::clone(evaluator.layout()), solution.x).unwrap();

    // A regular polygon is already in equilibrium.
    assert!(rates.max_abs_node(NodeUnknown::Normal) < 1e-8);
    assert!(rates.max_abs_node(NodeUnknown::Flux) < 1e-8);
    let volume_rate: f64 = evaluator
        .geometry()
        .nodes
        .iter()
        .zip(rates.node_values(NodeUnknown::Normal))
        .map(|(g, u)| g.volume_element * u)
        .sum();
    assert!(volume_rate.abs() < 1e-10);
}

#[test]
fn broyden_agrees_with_newton() {
    let state = circle_particle(RADIUS, 10, MaterialId(0)).unwrap();
    let (normalized, _) = evaluator_for(&state);
    // Flatten one node so the solution is not trivial.
    let particle = &normalized.particles()[0];
    let mut coordinates: Vec<_> = particle.nodes().iter().map(|n| n.coordinates).collect();
    coordinates[3].r *= 0.9;
    let moved = particle
        .moved(particle.center, particle.rotation, &coordinates)
        .unwrap();
    let perturbed = SystemState::new(0.0, vec![moved]).unwrap();

    let conditions = ProcessConditions::new(TEMPERATURE, 1.0);
    let norm = Norm::from_reference(&state, &alumina(), &conditions).unwrap();
    let kinetics = norm.normalize_materials(&alumina(), &conditions).unwrap();
    let layout = Arc::new(UnknownLayout::from_state(&perturbed).unwrap());
    let evaluator = TepEvaluator::new(&perturbed, layout, &kinetics, 1e-3).unwrap();

    let x0 = vec![0.0; evaluator.dimension()];
    let newton = NewtonRootFinder::new(RootFinderOptions::default())
        .find_root(&evaluator, x0.clone())
        .unwrap();
    let broyden = BroydenRootFinder::new(RootFinderOptions::default())
        .find_root(&evaluator, x0)
        .unwrap();
    for (a, b) in newton.x.iter().zip(&broyden.x) {
        assert!((a - b).abs() < 1e-4 * a.abs().max(1.0), "newton {a} vs broyden {b}");
    }
    let normal = newton.x[evaluator.layout().node_index_at(3, NodeUnknown::Normal)];
    assert!(normal > 0.0, "flattened node should move outward, got {normal}");
}

#[test]
fn evaluator_rejects_wrong_dimension() {
    let (_, evaluator) = evaluator_for(&neck_state());
    let err = evaluator.residual(&[0.0; 3]).unwrap_err();
    assert!(matches!(err, SinterError::LayoutMismatch(_)));
}

// ─── Validator Tests ──────────────────────────────────────────

fn ring_rates(values: &[f64]) -> (SystemState, UnknownVector) {
    let state = circle_particle(1.0, values.len(), MaterialId(0)).unwrap();
    let layout = Arc::new(UnknownLayout::from_state(&state).unwrap());
    let mut rates = UnknownVector::zeros(layout);
    for (node, &u) in state.particles()[0].nodes().iter().zip(values) {
        rates.set_node(node.id, NodeUnknown::Normal, u).unwrap();
    }
    (state, rates)
}

#[test]
fn four_alternating_differences_are_flagged_with_window_four() {
    let values = [0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    assert_eq!(alternating_run(&values, 1e-6), 4);

    let (state, rates) = ring_rates(&values);
    let aggressive = OscillationValidator::new(4);
    let err = aggressive.validate(&state, &rates).unwrap_err();
    assert_eq!(err.validator, "oscillation");

    let default = OscillationValidator::default();
    assert_eq!(default.window, 5);
    assert!(default.validate(&state, &rates).is_ok());
}

#[test]
fn smooth_ring_is_accepted() {
    let values: Vec<f64> = (0..16)
        .map(|k| (std::f64::consts::TAU * k as f64 / 16.0).sin())
        .collect();
    assert!(alternating_run(&values, 1e-6) <= 2);
    let (state, rates) = ring_rates(&values);
    assert!(OscillationValidator::new(4).validate(&state, &rates).is_ok());
}

#[test]
fn alternation_across_the_seam_counts() {
    // Differences: - + 0 0 0 + - + wrap around into a run of five.
    let values = [1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 0.0];
    assert_eq!(alternating_run(&values, 1e-6), 5);
}

#[test]
fn noise_is_not_oscillation() {
    let values = [1.0, 1.0 + 1e-9, 1.0, 1.0 + 1e-9, 1.0, 1.0 + 1e-9];
    assert_eq!(alternating_run(&values, 1e-6), 0);
}

#[test]
fn non_finite_rates_are_rejected() {
    let (state, mut rates) = ring_rates(&[0.0; 6]);
    let id = state.particles()[0].nodes()[1].id;
    rates.set_node(id, NodeUnknown::Flux, f64::NAN).unwrap();
    assert!(FiniteValuesValidator.validate(&state, &rates).is_err());
}

#[test]
fn narrowed_neck_is_rejected() {
    let resolution = ClusterResolution::for_radius(1.0, 40);
    let wide = two_particle_neck(1.0, 1.8, resolution, MaterialId(0)).unwrap();
    let narrow = two_particle_neck(1.0, 1.9, resolution, MaterialId(0)).unwrap();
    let validator = NeckRetreatValidator::default();

    let err = validator.validate_update(&wide, &narrow).unwrap_err();
    assert_eq!(err.validator, "neck_retreat");
    assert!(validator.validate_update(&narrow, &wide).is_ok());
    assert!(validator.validate_update(&wide, &wide).is_ok());
}

// ─── Recovery Tests ───────────────────────────────────────────

#[test]
fn recovery_depth_is_bounded_by_history() {
    let base = circle_particle(1.0, 6, MaterialId(0)).unwrap();
    let depth = 4;
    let mut recoverer = Recoverer::new(depth);
    for k in 0..6 {
        recoverer.remember(base.with_time(k as f64));
    }
    assert_eq!(recoverer.history().len(), depth);

    // Newest first, then further back.
    let times: Vec<f64> = (0..depth)
        .map(|_| recoverer.recover(5.0).unwrap().time())
        .collect();
    assert_eq!(times, vec![5.0, 4.0, 3.0, 2.0]);

    match recoverer.recover(5.0) {
        Err(SinterError::RecoveryFailed { attempts, .. }) => assert_eq!(attempts, depth as u32 + 1),
        other => panic!("expected RecoveryFailed, got {other:?}"),
    }
}

#[test]
fn accepted_step_resets_failure_streak() {
    let base = circle_particle(1.0, 6, MaterialId(0)).unwrap();
    let mut recoverer = Recoverer::new(2);
    recoverer.remember(base.clone());
    recoverer.recover(0.0).unwrap();
    recoverer.recover(0.0).unwrap();
    recoverer.remember(base.with_time(1.0));
    assert_eq!(recoverer.consecutive_failures(), 0);
    assert_eq!(recoverer.recover(1.0).unwrap().time(), 1.0);
}

// ─── Step Width Tests ─────────────────────────────────────────

#[test]
fn width_never_passes_end_time() {
    let (state, rates) = ring_rates(&[0.0; 6]);
    let controller = StepWidthController::new(StepWidthConfig {
        mode: StepWidthMode::Fixed,
        fixed: 1.0e-2,
        ..Default::default()
    });
    assert_relative_eq!(controller.choose(&state, &rates, 1.0), 1.0e-2);
    assert_relative_eq!(controller.choose(&state, &rates, 1.0e-3), 1.0e-3);
}

#[test]
fn adaptive_width_limits_displacement() {
    let (state, rates) = ring_rates(&[2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let config = StepWidthConfig::default();
    let controller = StepWidthController::new(config);
    let width = controller.choose(&state, &rates, f64::INFINITY);
    let segment = state.particles()[0].min_segment_length();
    assert_relative_eq!(
        width,
        config.max_displacement_fraction * segment / 2.0,
        max_relative = 1e-12
    );
}

#[test]
fn stability_bound_limits_adaptive_width() {
    let (state, rates) = ring_rates(&[2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let config = StepWidthConfig::default();
    let segment = state.particles()[0].min_segment_length();
    let controller = StepWidthController::new(config).with_diffusivity(10.0);
    let width = controller.choose(&state, &rates, f64::INFINITY);
    assert_relative_eq!(
        width,
        config.stability_fraction * segment.powi(4) / 10.0,
        max_relative = 1e-12
    );
    assert!(width < config.max_displacement_fraction * segment / 2.0);
}

#[test]
fn recovery_halves_the_cap_and_acceptance_relaxes_it() {
    let config = StepWidthConfig {
        mode: StepWidthMode::Fixed,
        fixed: 1.0e-2,
        max: 1.0e-2,
        ..Default::default()
    };
    let (state, rates) = ring_rates(&[0.0; 6]);
    let mut controller = StepWidthController::new(config);
    controller.on_recovered(Some(1.0e-2));
    assert_relative_eq!(controller.choose(&state, &rates, 1.0), 5.0e-3);
    controller.on_recovered(Some(5.0e-3));
    assert_relative_eq!(controller.cap(), 2.5e-3);

    controller.on_accepted(2.5e-3);
    assert_relative_eq!(controller.cap(), 5.0e-3);
    assert_relative_eq!(controller.largest(), 2.5e-3);
}

// ─── Break Condition Tests ────────────────────────────────────

#[test]
fn stalled_progress_triggers_on_collapsed_width() {
    let state = circle_particle(1.0, 6, MaterialId(0)).unwrap();
    let mut condition = StalledProgressCondition::new(1e-3);
    let ctx = |w: f64| BreakContext {
        state: &state,
        step_width: w,
        accepted_steps: 1,
    };
    assert!(!condition.should_break(&ctx(1.0)));
    assert!(!condition.should_break(&ctx(0.5)));
    assert!(condition.should_break(&ctx(1e-4)));
    assert_relative_eq!(condition.largest(), 1.0);
}

#[test]
fn pore_closure_measures_surface_runs() {
    let resolution = ClusterResolution::for_radius(1.0, 48);
    let state = three_particle_pore(1.0, 1.8, resolution, MaterialId(0)).unwrap();
    let ctx = BreakContext {
        state: &state,
        step_width: 1.0,
        accepted_steps: 1,
    };
    // The inner arc facing the pore is about 0.15 long.
    assert!(PoreClosureCondition::new(0.5).should_break(&ctx));
    assert!(!PoreClosureCondition::new(0.05).should_break(&ctx));
}

// ─── Session Tests ────────────────────────────────────────────

struct RejectFirst {
    remaining: std::sync::Mutex<u32>,
}

impl StepValidator for RejectFirst {
    fn validate(&self, _state: &SystemState, _rates: &UnknownVector) -> Result<(), InvalidStep> {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining == 0 {
            return Ok(());
        }
        *remaining -= 1;
        Err(InvalidStep::new(self.name(), "forced rejection"))
    }

    fn name(&self) -> &str {
        "reject_first"
    }
}

#[derive(Default)]
struct CountingHook {
    initialized: std::sync::Arc<std::sync::Mutex<(u32, u32, Option<bool>)>>,
}

impl SessionHook for CountingHook {
    fn on_session_initialized(&mut self, _state: &SystemState) {
        self.initialized.lock().unwrap().0 += 1;
    }

    fn on_step_accepted(&mut self, _state: &SystemState, _record: &StepRecord) {
        self.initialized.lock().unwrap().1 += 1;
    }

    fn on_session_finished(&mut self, success: bool) {
        self.initialized.lock().unwrap().2 = Some(success);
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[test]
fn end_before_start_returns_only_the_initial_state() {
    let mut input = input(neck_state(), 1.0, SolverConfig::default());
    input.conditions.duration = -1.0;
    let sink = VecSink::new();
    let outcome = SessionBuilder::new(input)
        .with_event_sink(Box::new(sink.clone()))
        .build()
        .unwrap()
        .run();

    assert!(outcome.success);
    assert_eq!(outcome.termination, Termination::EndTimeReached);
    assert_eq!(outcome.time_series.len(), 1);
    assert!(outcome.steps.is_empty());
    assert!(outcome.error.is_none());
    assert_eq!(sink.count("session_started"), 1);
    assert_eq!(sink.count("session_finished"), 1);
}

#[test]
fn cancelled_session_reports_partial_results() {
    let token = CancellationToken::new();
    token.cancel();
    let outcome = SessionBuilder::new(input(neck_state(), 1.0, SolverConfig::default()))
        .with_cancellation(token)
        .build()
        .unwrap()
        .run();
    assert!(!outcome.success);
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.time_series.len(), 1);
}

#[test]
fn exhausted_history_is_fatal() {
    let config = SolverConfig {
        remembered_state_count: 3,
        ..fixed_width(1.0e-5)
    };
    let outcome = SessionBuilder::new(input(neck_state(), 1.0e-3, config))
        .with_validator(Box::new(RejectFirst {
            remaining: std::sync::Mutex::new(u32::MAX),
        }))
        .build()
        .unwrap()
        .run();

    assert!(!outcome.success);
    assert_eq!(outcome.termination, Termination::Failed);
    assert_eq!(outcome.statistics.rejected_steps, 4);
    assert_eq!(outcome.statistics.recoveries, 3);
    assert!(matches!(
        outcome.error,
        Some(SinterError::RecoveryFailed { attempts: 4, .. })
    ));
    assert_eq!(outcome.time_series.len(), 1);
}

#[test]
fn rejected_steps_are_retried() {
    let sink = VecSink::new();
    let outcome = SessionBuilder::new(input(neck_state(), 3.0e-5, fixed_width(1.0e-5)))
        .with_validators(vec![Box::new(RejectFirst {
            remaining: std::sync::Mutex::new(2),
        })])
        .with_event_sink(Box::new(sink.clone()))
        .build()
        .unwrap()
        .run();

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.statistics.recoveries, 2);
    assert_eq!(sink.count("step_rejected"), 2);
    assert_eq!(sink.count("state_recovered"), 2);
    // The cap was halved twice before the first accepted step.
    assert_relative_eq!(
        outcome.steps[0].step_width,
        0.25e-5 * time_scale(&neck_state()),
        max_relative = 1e-9
    );
}

/// Fails after choosing its width whenever that width exceeds `limit`.
struct FailingSecondStage {
    limit: f64,
    attempts: Arc<Mutex<Vec<f64>>>,
}

impl TimeStepper for FailingSecondStage {
    fn step(&mut self, context: &StepContext<'_>) -> SinterResult<StepProposal> {
        let (rates, iterations) = context.solve(context.state, None, 0)?;
        let width = context.choose_width(&rates);
        self.attempts.lock().unwrap().push(width);
        if width > self.limit {
            return Err(SinterError::StepFailed {
                stage: 1,
                source: Box::new(SinterError::InvalidState("second stage diverged".into())),
            });
        }
        Ok(StepProposal {
            rates,
            step_width: width,
            iterations,
        })
    }

    fn name(&self) -> &str {
        "failing_second_stage"
    }
}

#[test]
fn stage_failure_halves_the_attempted_width() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let limit = 3.0e-6;
    let outcome = SessionBuilder::new(input(neck_state(), 1.0e-5, fixed_width(1.0e-5)))
        .with_stepper(Box::new(FailingSecondStage {
            limit,
            attempts: attempts.clone(),
        }))
        .build()
        .unwrap()
        .run();

    assert!(outcome.success, "{:?}", outcome.error);
    let attempts = attempts.lock().unwrap();
    assert!(attempts.len() >= 3);
    assert_relative_eq!(attempts[0], 1.0e-5, max_relative = 1e-12);
    assert_relative_eq!(attempts[1], 5.0e-6, max_relative = 1e-12);
    assert_relative_eq!(attempts[2], 2.5e-6, max_relative = 1e-12);
    assert!(outcome.statistics.recoveries >= 2);
    let scale = time_scale(&neck_state());
    for step in &outcome.steps {
        assert!(step.step_width <= limit * scale * (1.0 + 1e-9));
    }
}

#[test]
fn progress_is_measured_from_the_start_time() {
    let scale = time_scale(&neck_state());
    let start = 1.0e-4 * scale;
    let state = neck_state().with_time(start);
    let end = start + 3.0e-5 * scale;
    let reports: Arc<Mutex<Vec<Progress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let outcome = SessionBuilder::new(input(state, 3.0e-5, fixed_width(1.0e-5)))
        .with_hook(Box::new(ProgressHook::new(1, end, move |p: &Progress| {
            sink.lock().unwrap().push(*p);
        })))
        .build()
        .unwrap()
        .run();

    assert!(outcome.success, "{:?}", outcome.error);
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), outcome.steps.len());
    assert_eq!(reports[0].step, 1);
    assert_relative_eq!(reports[0].percent, 100.0 / 3.0, max_relative = 1e-6);
    assert_relative_eq!(reports[reports.len() - 1].percent, 100.0, max_relative = 1e-6);
    assert!(reports.windows(2).all(|w| w[1].percent > w[0].percent));
}

#[test]
fn two_particles_sinter() {
    let store = InMemoryStore::new();
    let hook = CountingHook::default();
    let counters = hook.initialized.clone();
    let config = SolverConfig {
        step_width: StepWidthConfig {
            max: 1.0e-3,
            ..Default::default()
        },
        ..Default::default()
    };
    let outcome = SessionBuilder::new(input(neck_state(), 5.0e-3, config))
        .with_store(Box::new(store.clone()))
        .with_hook(Box::new(hook))
        .build()
        .unwrap()
        .run();

    assert!(outcome.success, "{:?}", outcome.error);
    let series = &outcome.time_series;
    assert!(series.len() >= 2);
    assert_eq!(outcome.steps.len(), series.len() - 1);
    assert_eq!(outcome.steps[0].index, 1);
    assert_relative_eq!(outcome.steps[0].time, series[1].time());

    for pair in series.windows(2) {
        assert!(pair[1].time() > pair[0].time());
        assert!(
            neck_width(&pair[1]) >= neck_width(&pair[0]) - 1e-9 * RADIUS,
            "neck shrank at t = {}",
            pair[1].time()
        );
        assert!(
            center_distance(&pair[1]) <= center_distance(&pair[0]) + 1e-9 * RADIUS,
            "particles separated at t = {}",
            pair[1].time()
        );
    }
    let first = &series[0];
    let last = &series[series.len() - 1];
    assert!(neck_width(last) > neck_width(first));

    assert_eq!(store.state_count(), series.len());
    assert_eq!(store.step_count(), outcome.steps.len());
    let counts = *counters.lock().unwrap();
    assert_eq!(counts.0, 1);
    assert_eq!(counts.1 as usize, outcome.steps.len());
    assert_eq!(counts.2, Some(true));
}

#[test]
fn other_steppers_run() {
    for stepper in [
        Box::new(FourStageStepper::new()) as Box<dyn sinter_solver::TimeStepper>,
        Box::new(TrapezoidalStepper::new()),
    ] {
        let name = stepper.name().to_string();
        let outcome = SessionBuilder::new(input(neck_state(), 3.0e-5, fixed_width(1.0e-5)))
            .with_stepper(stepper)
            .build()
            .unwrap()
            .run();
        assert!(outcome.success, "{name}: {:?}", outcome.error);
        assert_eq!(outcome.termination, Termination::EndTimeReached, "{name}");
        assert!(outcome.steps.len() >= 3, "{name}");
    }
}

#[test]
fn missing_material_fails_the_build() {
    let mut input = input(neck_state(), 1.0, SolverConfig::default());
    input.materials = MaterialTable::new().with_material(
        MaterialId(3),
        MaterialDatabase::with_defaults().get("copper").unwrap().clone(),
    );
    let err = SessionBuilder::new(input).build().err().unwrap();
    assert!(matches!(err, SinterError::MissingMaterial(_)));
    assert!(err.is_structural());
}

#[test]
fn grain_boundary_without_equilibrium_neck_fails_the_build() {
    let mut input = input(neck_state(), 1.0, SolverConfig::default());
    let surface_energy = input.materials.materials[0].material.surface_energy;
    input.materials.materials[0].material.grain_boundary_energy = 2.5 * surface_energy;
    let err = SessionBuilder::new(input).build().err().unwrap();
    assert!(matches!(err, SinterError::InvalidMaterial(_)), "{err:?}");
}

#[test]
fn invalid_config_fails_the_build() {
    let config = SolverConfig {
        instability_window: 1,
        ..Default::default()
    };
    let err = SessionBuilder::new(input(neck_state(), 1.0, config))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SinterError::InvalidConfig(_)));
}

// ─── Config Tests ─────────────────────────────────────────────

#[test]
fn config_presets_validate() {
    SolverConfig::default().validate().unwrap();
    SolverConfig::coarse().validate().unwrap();
    let precise = SolverConfig::precise();
    precise.validate().unwrap();
    assert_eq!(precise.instability_window, 4);
    assert_eq!(precise.build_stepper().name(), "four_stage");
}

#[test]
fn config_from_partial_toml() {
    let config: SolverConfig = toml::from_str(
        r#"
        root_finder = "broyden"
        time_stepper = "trapezoidal"
        remembered_state_count = 8

        [step_width]
        mode = "fixed"
        fixed = 0.001
        "#,
    )
    .unwrap();
    assert_eq!(config.remembered_state_count, 8);
    assert_eq!(config.step_width.mode, StepWidthMode::Fixed);
    assert_eq!(config.step_width.growth_factor, 2.0);
    assert_eq!(config.build_root_finder().name(), "broyden");
    assert_eq!(config.build_stepper().name(), "trapezoidal");
    assert_eq!(config.instability_window, 5);

    let json = serde_json::to_string(&config).unwrap();
    let back: SolverConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn session_input_round_trips_through_json() {
    let input = input(neck_state(), 1.0, SolverConfig::coarse());
    let json = serde_json::to_string(&input).unwrap();
    let back: SessionInput = serde_json::from_str(&json).unwrap();
    assert_eq!(back.config, input.config);
    assert_eq!(back.state.node_count(), input.state.node_count());
    assert_eq!(back.conditions, input.conditions);
}

#[test]
fn three_particle_cluster_steps() {
    let resolution = ClusterResolution::for_radius(RADIUS, 48);
    let state = three_particle_pore(RADIUS, 1.8 * RADIUS, resolution, MaterialId(0)).unwrap();
    let outcome = SessionBuilder::new(input(state, 2.0e-5, fixed_width(1.0e-5)))
        .build()
        .unwrap()
        .run();
    assert!(outcome.success, "{:?}", outcome.error);
    let last = outcome.final_state().unwrap();
    assert_eq!(last.particle_count(), 3);
    last.require_contacts().unwrap();
}
