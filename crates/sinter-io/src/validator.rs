//! Input validation.
//!
//! Validates simulation inputs before a session receives them,
//! catching data-level errors early with clear diagnostics.

use sinter_model::{contact_pairs, SystemState};
use sinter_solver::SessionInput;
use sinter_types::{SinterError, SinterResult};

use crate::contract::{ScenarioSpec, SimulationFile};

/// Validates a complete session input.
///
/// Checks:
/// - Solver configuration and process conditions
/// - Every material parameter is positive and finite
/// - Every particle refers to a supplied material and has finite coordinates
/// - Every contact pair joins two materials with a known interface that
///   admits an equilibrium dihedral angle
pub fn validate_input(input: &SessionInput) -> SinterResult<()> {
    input.config.validate()?;
    input.conditions.validate()?;
    input.materials.validate()?;
    validate_state(input)?;
    Ok(())
}

fn validate_state(input: &SessionInput) -> SinterResult<()> {
    let state = &input.state;
    if state.particle_count() == 0 {
        return Err(SinterError::InvalidState("state has no particles".into()));
    }
    for particle in state.particles() {
        input.materials.material(particle.material)?;
        if !particle.is_finite() {
            return Err(SinterError::InvalidState(format!(
                "particle {} has non-finite coordinates",
                particle.id
            )));
        }
    }
    for pair in contact_pairs(state) {
        if let (Some((a, _)), Some((b, _))) = (state.locate(pair.primary), state.locate(pair.secondary))
        {
            input.materials.dihedral_angle(a.material, b.material)?;
        }
    }
    Ok(())
}

/// Validates a simulation file: scenario parameters first, then the
/// session input it builds.
pub fn validate_file(file: &SimulationFile) -> SinterResult<SessionInput> {
    validate_scenario(&file.scenario)?;
    if file.output.state_stride == 0 {
        return Err(SinterError::InvalidConfig(
            "output.state_stride must be >= 1".into(),
        ));
    }
    let input = file.session_input()?;
    validate_input(&input)?;
    Ok(input)
}

fn validate_scenario(scenario: &ScenarioSpec) -> SinterResult<()> {
    let (radius, center_distance, nodes_per_circle) = match scenario {
        ScenarioSpec::TwoParticleNeck {
            radius,
            center_distance,
            nodes_per_circle,
            ..
        }
        | ScenarioSpec::ThreeParticlePore {
            radius,
            center_distance,
            nodes_per_circle,
            ..
        } => (*radius, *center_distance, *nodes_per_circle),
        ScenarioSpec::StateFile { path } => {
            if !path.exists() {
                return Err(SinterError::InvalidConfig(format!(
                    "state file {} does not exist",
                    path.display()
                )));
            }
            return Ok(());
        }
    };

    if !(radius.is_finite() && radius > 0.0) {
        return Err(SinterError::InvalidConfig(format!(
            "radius must be positive, got {radius}"
        )));
    }
    if !(center_distance > 0.0 && center_distance < 2.0 * radius) {
        return Err(SinterError::InvalidConfig(format!(
            "center distance {center_distance} must lie in (0, {}) for overlapping particles",
            2.0 * radius
        )));
    }
    if nodes_per_circle < 8 {
        return Err(SinterError::InvalidConfig(format!(
            "nodes_per_circle must be >= 8, got {nodes_per_circle}"
        )));
    }
    Ok(())
}

/// Number of neck contacts of a state, for diagnostics.
pub fn neck_count(state: &SystemState) -> usize {
    contact_pairs(state)
        .iter()
        .filter(|p| p.kind == sinter_model::ContactKind::Neck)
        .count()
}
