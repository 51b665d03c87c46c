//! Solver session: the step loop with validation, rollback and break
//! conditions.
//!
//! ```text
//!            ┌──────────────── accepted ───────────────┐
//!            ▼                                          │
//! Stepping ─► Validating ─► Accepted ─► break? ─► done  │
//!                 │                        └── no ──────┘
//!                 └─► Invalid ─► Recovering ─► Stepping
//!                                    └─► history exhausted ─► failed
//! ```
//!
//! A session owns everything it mutates: the current state, the last
//! accepted rates, the rollback history, its routines, the telemetry bus,
//! the output store and a cancellation token. Sessions share nothing, so
//! independent runs may execute on different threads.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sinter_material::{MaterialTable, ProcessConditions};
use sinter_math::RootFinder;
use sinter_model::{
    contact_pairs, discover_contacts, NullStore, StateStore, StepRecord, SystemState,
};
use sinter_telemetry::{EventBus, EventKind, EventSink};
use sinter_types::{SinterError, SinterResult};

use crate::breaks::{BreakCondition, BreakContext, PoreClosureCondition, StalledProgressCondition};
use crate::config::SolverConfig;
use crate::hooks::SessionHook;
use crate::layout::UnknownLayout;
use crate::norm::{Norm, NormalizedMaterials};
use crate::recovery::Recoverer;
use crate::stepper::{StepContext, StepWidthController, TimeStepper};
use crate::unknowns::UnknownVector;
use crate::update::{advance, step_record};
use crate::validator::{
    FiniteValuesValidator, InvalidStep, NeckRetreatValidator, OscillationValidator, StepValidator,
};

/// Everything that defines a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInput {
    /// Initial state in physical units.
    pub state: SystemState,
    pub materials: MaterialTable,
    pub conditions: ProcessConditions,
    #[serde(default)]
    pub config: SolverConfig,
}

/// Cooperative cancellation flag, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    EndTimeReached,
    /// Named break condition triggered.
    BreakCondition(String),
    Cancelled,
    Failed,
}

/// Step counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub recoveries: u64,
    /// Root-finder iterations over all accepted steps.
    pub root_iterations: u64,
}

/// Result of a run.
///
/// The series holds the initial state followed by every accepted state, in
/// physical units. It is kept on failure and cancellation.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub success: bool,
    pub termination: Termination,
    pub time_series: Vec<SystemState>,
    pub steps: Vec<StepRecord>,
    pub error: Option<SinterError>,
    pub statistics: SessionStatistics,
}

impl SimulationOutcome {
    /// Last accepted state.
    pub fn final_state(&self) -> Option<&SystemState> {
        self.time_series.last()
    }
}

/// A step that passed validation, normalized.
#[derive(Debug, Clone)]
pub struct AcceptedStep {
    pub state: SystemState,
    pub rates: UnknownVector,
    pub step_width: f64,
    pub iterations: u32,
}

/// Result of one step attempt.
#[derive(Debug)]
pub enum StepOutcome {
    Accepted(AcceptedStep),
    /// Rejected by a validator or by a recoverable numeric failure.
    Invalid(InvalidStep),
    Fatal(SinterError),
}

/// Assembles a [`SolverSession`] from its input and routines.
///
/// Routines not given explicitly come from the [`SolverConfig`].
pub struct SessionBuilder {
    input: SessionInput,
    stepper: Option<Box<dyn TimeStepper>>,
    root_finder: Option<Box<dyn RootFinder>>,
    validators: Option<Vec<Box<dyn StepValidator>>>,
    extra_validators: Vec<Box<dyn StepValidator>>,
    breaks: Option<Vec<Box<dyn BreakCondition>>>,
    extra_breaks: Vec<Box<dyn BreakCondition>>,
    hooks: Vec<Box<dyn SessionHook>>,
    store: Box<dyn StateStore>,
    bus: EventBus,
    cancellation: CancellationToken,
}

impl SessionBuilder {
    pub fn new(input: SessionInput) -> Self {
        Self {
            input,
            stepper: None,
            root_finder: None,
            validators: None,
            extra_validators: Vec::new(),
            breaks: None,
            extra_breaks: Vec::new(),
            hooks: Vec::new(),
            store: Box::new(NullStore),
            bus: EventBus::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_stepper(mut self, stepper: Box<dyn TimeStepper>) -> Self {
        self.stepper = Some(stepper);
        self
    }

    pub fn with_root_finder(mut self, root_finder: Box<dyn RootFinder>) -> Self {
        self.root_finder = Some(root_finder);
        self
    }

    /// Adds a validator after the default ones.
    pub fn with_validator(mut self, validator: Box<dyn StepValidator>) -> Self {
        self.extra_validators.push(validator);
        self
    }

    /// Replaces the default validators.
    pub fn with_validators(mut self, validators: Vec<Box<dyn StepValidator>>) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Adds a break condition after the default ones.
    pub fn with_break_condition(mut self, condition: Box<dyn BreakCondition>) -> Self {
        self.extra_breaks.push(condition);
        self
    }

    /// Replaces the default break conditions.
    pub fn with_break_conditions(mut self, conditions: Vec<Box<dyn BreakCondition>>) -> Self {
        self.breaks = Some(conditions);
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn SessionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_store(mut self, store: Box<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.bus.add_sink(sink);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Validates the input, resolves contacts and normalizes.
    ///
    /// Every error here is structural: bad configuration, unknown materials,
    /// malformed rings or unresolvable contacts.
    pub fn build(self) -> SinterResult<SolverSession> {
        let SessionInput {
            state,
            materials,
            conditions,
            config,
        } = self.input;
        config.validate()?;
        conditions.validate()?;
        materials.validate()?;
        for particle in state.particles() {
            materials.material(particle.material)?;
        }

        let state = resolve_contacts(state, config.contact_tolerance)?;
        let mut joined = BTreeSet::new();
        for pair in contact_pairs(&state) {
            let (a, b) = match (state.locate(pair.primary), state.locate(pair.secondary)) {
                (Some((a, _)), Some((b, _))) => (a.material, b.material),
                _ => {
                    return Err(SinterError::InvalidContact(format!(
                        "contact {}/{} references a missing node",
                        pair.primary, pair.secondary
                    )))
                }
            };
            joined.insert((a.min(b), a.max(b)));
        }
        // Every joined pair needs a physical equilibrium neck.
        for (a, b) in joined {
            let angle = materials.dihedral_angle(a, b)?;
            tracing::debug!(first = %a, second = %b, dihedral = angle.total(), "interface checked");
        }

        let norm = Norm::from_reference(&state, &materials, &conditions)?;
        let normalized = norm.normalize_state(&state)?;
        let normalized_materials = norm.normalize_materials(&materials, &conditions)?;
        let layout = Arc::new(UnknownLayout::from_state(&normalized)?);
        let end_time = norm.normalize_time(state.time() + conditions.duration);

        let mut validators = self.validators.unwrap_or_else(|| {
            vec![
                Box::new(FiniteValuesValidator) as Box<dyn StepValidator>,
                Box::new(OscillationValidator::new(config.instability_window)),
                Box::new(NeckRetreatValidator::default()),
            ]
        });
        validators.extend(self.extra_validators);
        let mut breaks = self.breaks.unwrap_or_else(|| {
            vec![
                Box::new(PoreClosureCondition::new(config.neck_distance_threshold))
                    as Box<dyn BreakCondition>,
                Box::new(StalledProgressCondition::new(config.break_ratio)),
            ]
        });
        breaks.extend(self.extra_breaks);

        Ok(SolverSession {
            stepper: self.stepper.unwrap_or_else(|| config.build_stepper()),
            root_finder: self.root_finder.unwrap_or_else(|| config.build_root_finder()),
            validators,
            breaks,
            hooks: self.hooks,
            store: self.store,
            bus: self.bus,
            cancellation: self.cancellation,
            recoverer: Recoverer::new(config.remembered_state_count),
            widths: StepWidthController::new(config.step_width)
                .with_diffusivity(normalized_materials.max_diffusivity()),
            initial: state,
            current: normalized,
            layout,
            materials: normalized_materials,
            norm,
            end_time,
            last_rates: None,
            last_attempt: None,
            statistics: SessionStatistics::default(),
            time_series: Vec::new(),
            steps: Vec::new(),
            config,
        })
    }
}

/// Pairs up unreferenced contact nodes when some are missing.
fn resolve_contacts(state: SystemState, tolerance: f64) -> SinterResult<SystemState> {
    let unresolved = state
        .particles()
        .iter()
        .flat_map(|p| p.nodes())
        .any(|n| n.kind.needs_contact() && n.contact.is_none());
    if !unresolved {
        return Ok(state);
    }
    let reference = state
        .particles()
        .first()
        .map_or(1.0, |p| p.mean_node_radius());
    let mut particles = state.particles().to_vec();
    let created = discover_contacts(&mut particles, tolerance * reference);
    tracing::debug!(created, "discovered contacts");
    let resolved = SystemState::new(state.time(), particles)?;
    resolved.require_contacts()?;
    Ok(resolved)
}

/// One sintering run.
pub struct SolverSession {
    config: SolverConfig,
    stepper: Box<dyn TimeStepper>,
    root_finder: Box<dyn RootFinder>,
    validators: Vec<Box<dyn StepValidator>>,
    breaks: Vec<Box<dyn BreakCondition>>,
    hooks: Vec<Box<dyn SessionHook>>,
    store: Box<dyn StateStore>,
    bus: EventBus,
    cancellation: CancellationToken,
    recoverer: Recoverer,
    widths: StepWidthController,
    /// Initial state in physical units, contacts resolved.
    initial: SystemState,
    /// Current state, normalized.
    current: SystemState,
    layout: Arc<UnknownLayout>,
    materials: NormalizedMaterials,
    norm: Norm,
    /// Normalized end time.
    end_time: f64,
    last_rates: Option<UnknownVector>,
    last_attempt: Option<f64>,
    statistics: SessionStatistics,
    time_series: Vec<SystemState>,
    steps: Vec<StepRecord>,
}

impl SolverSession {
    pub fn norm(&self) -> &Norm {
        &self.norm
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn layout(&self) -> &Arc<UnknownLayout> {
        &self.layout
    }

    /// Initial state in physical units, with contacts resolved.
    pub fn initial_state(&self) -> &SystemState {
        &self.initial
    }

    /// Current state in normalized units.
    pub fn normalized_state(&self) -> &SystemState {
        &self.current
    }

    /// End time in physical units.
    pub fn end_time(&self) -> f64 {
        self.norm.denormalize_time(self.end_time)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn emit(&self, kind: EventKind) {
        self.bus.publish(kind);
    }

    fn end_reached(&self) -> bool {
        let slack = 1.0e-12 * self.end_time.abs().max(1.0);
        self.current.time() >= self.end_time - slack
    }

    /// Runs until the end time, a break condition, cancellation or a fatal error.
    pub fn run(mut self) -> SimulationOutcome {
        let initial = self.initial.clone();
        self.emit(EventKind::SessionStarted {
            particles: initial.particle_count() as u32,
            nodes: initial.node_count() as u32,
            unknowns: self.layout.len() as u32,
            start_time: initial.time(),
            end_time: self.end_time(),
        });
        tracing::info!(
            particles = initial.particle_count(),
            nodes = initial.node_count(),
            stepper = self.stepper.name(),
            root_finder = self.root_finder.name(),
            end_time = self.end_time(),
            "session started"
        );
        for hook in &mut self.hooks {
            hook.on_session_initialized(&initial);
        }
        self.store.store_state(&initial);
        self.time_series.push(initial);
        self.recoverer.remember(self.current.clone());
        self.bus.flush();

        loop {
            if self.end_reached() {
                return self.finish(true, Termination::EndTimeReached, None);
            }
            if self.cancellation.is_cancelled() {
                return self.finish(false, Termination::Cancelled, None);
            }
            if !self.layout.matches(&self.current) {
                match UnknownLayout::from_state(&self.current) {
                    Ok(layout) => self.layout = Arc::new(layout),
                    Err(e) => return self.finish(false, Termination::Failed, Some(e)),
                }
                self.last_rates = None;
            }

            match self.attempt_step() {
                StepOutcome::Accepted(step) => {
                    if let Err(e) = self.accept(step) {
                        return self.finish(false, Termination::Failed, Some(e));
                    }
                    if self.end_reached() {
                        return self.finish(true, Termination::EndTimeReached, None);
                    }
                    if let Some(name) = self.check_breaks() {
                        self.emit(EventKind::BreakConditionMet {
                            condition: name.clone(),
                        });
                        tracing::info!(condition = %name, "break condition met");
                        return self.finish(true, Termination::BreakCondition(name), None);
                    }
                }
                StepOutcome::Invalid(invalid) => {
                    if let Err(e) = self.recover(invalid) {
                        return self.finish(false, Termination::Failed, Some(e));
                    }
                }
                StepOutcome::Fatal(e) => {
                    return self.finish(false, Termination::Failed, Some(e));
                }
            }
            self.bus.flush();
        }
    }

    /// Proposes, validates and applies one step from the current state.
    ///
    /// The outcome is not committed; [`run`](Self::run) accepts or rolls back.
    pub fn attempt_step(&mut self) -> StepOutcome {
        self.last_attempt = None;
        let context = StepContext {
            state: &self.current,
            layout: &self.layout,
            materials: &self.materials,
            root_finder: self.root_finder.as_ref(),
            widths: &self.widths,
            previous: self.last_rates.as_ref(),
            friction: self.config.friction_coefficient,
            remaining: self.end_time - self.current.time(),
            chosen: Cell::new(None),
        };
        let result = self.stepper.step(&context);
        self.last_attempt = match &result {
            Ok(proposal) => Some(proposal.step_width),
            Err(_) => context.chosen_width(),
        };
        let proposal = match result {
            Ok(proposal) => proposal,
            Err(e) if e.is_recoverable() => {
                return StepOutcome::Invalid(InvalidStep::new(self.root_finder.name(), e.to_string()))
            }
            Err(e) => return StepOutcome::Fatal(e),
        };

        for validator in &self.validators {
            if let Err(invalid) = validator.validate(&self.current, &proposal.rates) {
                return StepOutcome::Invalid(invalid);
            }
        }

        let state = match advance(&self.current, &proposal.rates, proposal.step_width) {
            Ok(state) => state,
            Err(e) if e.is_recoverable() => {
                return StepOutcome::Invalid(InvalidStep::new("update", e.to_string()))
            }
            Err(e) => return StepOutcome::Fatal(e),
        };
        for validator in &self.validators {
            if let Err(invalid) = validator.validate_update(&self.current, &state) {
                return StepOutcome::Invalid(invalid);
            }
        }
        StepOutcome::Accepted(AcceptedStep {
            state,
            rates: proposal.rates,
            step_width: proposal.step_width,
            iterations: proposal.iterations,
        })
    }

    fn accept(&mut self, step: AcceptedStep) -> SinterResult<()> {
        let index = self.statistics.accepted_steps + 1;
        let record = step_record(index, &self.current, &step.state, &step.rates, step.step_width);
        let physical_record = self.norm.denormalize_record(&record);
        let physical_state = self.norm.denormalize_state(&step.state)?;

        self.statistics.accepted_steps += 1;
        self.bus
            .set_step(u32::try_from(self.statistics.accepted_steps).unwrap_or(u32::MAX));
        self.statistics.root_iterations += u64::from(step.iterations);
        self.widths.on_accepted(step.step_width);
        self.recoverer.remember(step.state.clone());
        self.current = step.state;
        self.last_rates = Some(step.rates);

        tracing::debug!(
            step = index,
            time = physical_state.time(),
            step_width = physical_record.step_width,
            iterations = step.iterations,
            "step accepted"
        );
        self.emit(EventKind::StepAccepted {
            sim_time: physical_state.time(),
            step_width: physical_record.step_width,
            iterations: step.iterations,
        });
        self.store.store_state(&physical_state);
        self.store.store_step(&physical_record);
        for hook in &mut self.hooks {
            hook.on_step_accepted(&physical_state, &physical_record);
        }
        self.time_series.push(physical_state);
        self.steps.push(physical_record);
        Ok(())
    }

    fn recover(&mut self, invalid: InvalidStep) -> SinterResult<()> {
        self.statistics.rejected_steps += 1;
        tracing::warn!(validator = %invalid.validator, reason = %invalid.reason, "step rejected");
        self.emit(EventKind::StepRejected {
            validator: invalid.validator,
            reason: invalid.reason,
        });

        let physical_time = self.norm.denormalize_time(self.current.time());
        let restored = self.recoverer.recover(physical_time)?;
        self.statistics.recoveries += 1;
        self.widths.on_recovered(self.last_attempt);
        self.last_rates = None;
        self.stepper.reset();
        self.current = restored;

        let cap = self.norm.denormalize_time(self.widths.cap());
        tracing::warn!(
            time = self.norm.denormalize_time(self.current.time()),
            attempts = self.recoverer.consecutive_failures(),
            step_width_cap = cap,
            "state recovered"
        );
        self.emit(EventKind::StateRecovered {
            sim_time: self.norm.denormalize_time(self.current.time()),
            attempts: self.recoverer.consecutive_failures(),
            step_width_cap: cap,
        });
        Ok(())
    }

    fn check_breaks(&mut self) -> Option<String> {
        let context = BreakContext {
            state: &self.current,
            step_width: self.widths.last().unwrap_or(0.0),
            accepted_steps: self.statistics.accepted_steps,
        };
        self.breaks
            .iter_mut()
            .find_map(|b| b.should_break(&context).then(|| b.name().to_string()))
    }

    fn finish(
        mut self,
        success: bool,
        termination: Termination,
        error: Option<SinterError>,
    ) -> SimulationOutcome {
        match &error {
            Some(e) => tracing::error!(error = %e, "session failed"),
            None => tracing::info!(
                success,
                termination = ?termination,
                accepted = self.statistics.accepted_steps,
                rejected = self.statistics.rejected_steps,
                "session finished"
            ),
        }
        self.emit(EventKind::SessionFinished {
            success,
            accepted_steps: u32::try_from(self.statistics.accepted_steps).unwrap_or(u32::MAX),
            rejected_steps: u32::try_from(self.statistics.rejected_steps).unwrap_or(u32::MAX),
        });
        self.bus.finalize();
        self.store.finalize();
        for hook in &mut self.hooks {
            hook.on_session_finished(success);
        }
        SimulationOutcome {
            success,
            termination,
            time_series: self.time_series,
            steps: self.steps,
            error,
            statistics: self.statistics,
        }
    }
}
