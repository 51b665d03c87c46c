//! Applying rates to a state.

use sinter_math::polar::rotate;
use sinter_math::{normalize_angle, DVec2, PolarCoordinates};
use sinter_model::{
    contact_pairs, NodeStepRecord, Particle, ParticleStepRecord, StepRecord, SystemState,
};
use sinter_types::{SinterError, SinterResult};

use crate::geometry::{surface_frame, ParticleFrame};
use crate::layout::{NodeUnknown, ParticleUnknown};
use crate::unknowns::UnknownVector;

/// Moves `state` forward by `width` along `rates`.
///
/// Particles move rigidly by their center velocity and angular velocity;
/// every node additionally moves by `width·u` along its normal at `state`.
/// Contacting nodes are then placed on their common midpoint so pairs stay
/// coincident.
pub fn advance(state: &SystemState, rates: &UnknownVector, width: f64) -> SinterResult<SystemState> {
    let layout = rates.layout();
    if !layout.matches(state) {
        return Err(SinterError::LayoutMismatch(
            "rates do not belong to this state".into(),
        ));
    }
    if !width.is_finite() || width < 0.0 {
        return Err(SinterError::InvalidState(format!("invalid step width {width}")));
    }

    let mut centers = Vec::with_capacity(state.particle_count());
    let mut rotations = Vec::with_capacity(state.particle_count());
    let mut positions: Vec<Vec<DVec2>> = Vec::with_capacity(state.particle_count());
    let mut slot = 0;

    for (p, particle) in state.particles().iter().enumerate() {
        let frame = ParticleFrame::of(particle);
        let velocity = frame.velocity(
            rates.particle_at(p, ParticleUnknown::RadialDisplacement),
            rates.particle_at(p, ParticleUnknown::AngularDisplacement),
        );
        let center = frame.center + width * velocity;
        let rotation =
            particle.rotation + width * rates.particle_at(p, ParticleUnknown::RotationDisplacement);

        let mut moved = Vec::with_capacity(particle.node_count());
        for i in 0..particle.node_count() {
            let normal = surface_frame(particle, i)?.normal;
            let u = rates.node_at(slot, NodeUnknown::Normal);
            let body = particle.nodes()[i].coordinates.to_cartesian_rotated(rotation);
            moved.push(center + body + width * u * normal);
            slot += 1;
        }
        centers.push(center);
        rotations.push(rotation);
        positions.push(moved);
    }

    for pair in contact_pairs(state) {
        let (a, b) = match (state.location(pair.primary), state.location(pair.secondary)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(SinterError::InvalidContact(format!(
                    "contact {}/{} references a missing node",
                    pair.primary, pair.secondary
                )))
            }
        };
        let midpoint = 0.5 * (positions[a.particle][a.node] + positions[b.particle][b.node]);
        positions[a.particle][a.node] = midpoint;
        positions[b.particle][b.node] = midpoint;
    }

    let particles = state
        .particles()
        .iter()
        .enumerate()
        .map(|(p, particle)| {
            let coordinates: Vec<PolarCoordinates> = positions[p]
                .iter()
                .map(|&position| {
                    PolarCoordinates::from_cartesian(rotate(position - centers[p], -rotations[p]))
                })
                .collect();
            particle.moved(
                PolarCoordinates::from_cartesian(centers[p]),
                normalize_angle(rotations[p]),
                &coordinates,
            )
        })
        .collect::<SinterResult<Vec<Particle>>>()?;

    SystemState::new(state.time() + width, particles)
}

/// Per-particle and per-node changes between `base` and `next`.
///
/// The chemical potential is `−λ`, the negated volume multiplier.
pub fn step_record(
    index: u64,
    base: &SystemState,
    next: &SystemState,
    rates: &UnknownVector,
    width: f64,
) -> StepRecord {
    let mut slot = 0;
    let particles = base
        .particles()
        .iter()
        .zip(next.particles())
        .enumerate()
        .map(|(p, (before, after))| {
            let nodes = before
                .nodes()
                .iter()
                .map(|node| {
                    let record = NodeStepRecord {
                        node: node.id,
                        normal_displacement: width * rates.node_at(slot, NodeUnknown::Normal),
                        flux: width * rates.node_at(slot, NodeUnknown::Flux),
                        chemical_potential: -rates.node_at(slot, NodeUnknown::LambdaVolume),
                    };
                    slot += 1;
                    record
                })
                .collect();
            ParticleStepRecord {
                particle: before.id,
                displacement: after.center_position() - before.center_position(),
                rotation: width * rates.particle_at(p, ParticleUnknown::RotationDisplacement),
                volume_change: after.area() - before.area(),
                nodes,
            }
        })
        .collect();

    StepRecord {
        index,
        time: next.time(),
        step_width: width,
        particles,
    }
}
