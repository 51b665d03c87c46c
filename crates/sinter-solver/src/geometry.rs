//! Geometry of a state, frozen for one evaluation.
//!
//! Everything the residual needs from the state is computed once here:
//! particle frames, per-node normals and volume elements, segment
//! resistances, capillary driving forces and the contact constraints.

use rayon::prelude::*;
use sinter_math::polar::cross;
use sinter_math::DVec2;
use sinter_model::{contact_pairs, ContactKind, NodeKind, Particle, SystemState};
use sinter_types::constants::DEGENERATE_LENGTH_THRESHOLD;
use sinter_types::{SinterError, SinterResult};

use crate::layout::UnknownLayout;
use crate::norm::{Kinetics, NormalizedMaterials};

/// Rigid-body frame of a particle.
#[derive(Debug, Clone, Copy)]
pub struct ParticleFrame {
    /// Center position.
    pub center: DVec2,
    /// Unit vector along the center's radial direction.
    pub radial: DVec2,
    /// Unit vector along the center's angular direction.
    pub angular: DVec2,
    /// Distance of the center from the origin.
    pub radius: f64,
    /// Mean node radius, used as the radius of gyration.
    pub gyration: f64,
}

impl ParticleFrame {
    pub fn of(particle: &Particle) -> Self {
        Self {
            center: particle.center_position(),
            radial: particle.center.radial_direction(),
            angular: particle.center.angular_direction(),
            radius: particle.center.r,
            gyration: particle.mean_node_radius(),
        }
    }

    /// Center velocity for the given radial and angular rates.
    #[inline]
    pub fn velocity(&self, radial: f64, angular: f64) -> DVec2 {
        radial * self.radial + angular * self.angular
    }
}

/// Outward normal and volume element of a node.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceFrame {
    pub normal: DVec2,
    pub volume_element: f64,
}

/// Whether the segment between two ring neighbours lies on a grain boundary.
#[inline]
pub fn is_interface_segment(lower: NodeKind, upper: NodeKind) -> bool {
    lower == NodeKind::GrainBoundary
        || upper == NodeKind::GrainBoundary
        || (lower == NodeKind::Neck && upper == NodeKind::Neck)
}

fn unit(v: DVec2, what: &str) -> SinterResult<(DVec2, f64)> {
    let length = v.length();
    if !length.is_finite() || length < DEGENERATE_LENGTH_THRESHOLD {
        return Err(SinterError::InvalidState(format!(
            "degenerate {what} of length {length}"
        )));
    }
    Ok((v / length, length))
}

/// Normal and volume element of the node at ring position `i`.
///
/// Surface and grain-boundary nodes use the chord between their
/// neighbours. A neck moves along its grain boundary and sweeps area only
/// on its free-surface side.
pub fn surface_frame(particle: &Particle, i: usize) -> SinterResult<SurfaceFrame> {
    let node = &particle.nodes()[i];
    let lower = particle.lower_of(i);
    let upper = particle.upper_of(i);
    let len = particle.node_count();
    let p = particle.node_position_at(i);
    let p_lo = particle.node_position_at((i + len - 1) % len);
    let p_up = particle.node_position_at((i + 1) % len);

    if node.kind == NodeKind::Neck {
        let lower_interface = is_interface_segment(lower.kind, node.kind);
        let upper_interface = is_interface_segment(node.kind, upper.kind);
        let sides = match (lower_interface, upper_interface) {
            (true, false) => Some((p_lo, p_up)),
            (false, true) => Some((p_up, p_lo)),
            _ => None,
        };
        if let Some((interface_side, surface_side)) = sides {
            let (normal, _) = unit(p - interface_side, "grain boundary segment")?;
            unit(p - surface_side, "surface segment")?;
            let volume_element = 0.5 * cross(normal, p - surface_side).abs();
            return Ok(SurfaceFrame {
                normal,
                volume_element,
            });
        }
    }

    let (tangent, chord) = unit(p_up - p_lo, "node chord")?;
    Ok(SurfaceFrame {
        normal: DVec2::new(tangent.y, -tangent.x),
        volume_element: 0.5 * chord,
    })
}

/// Role of a node in the contact constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRole {
    Free,
    /// Carries constraint `k`.
    Primary(usize),
    /// Partner of the node carrying constraint `k`.
    Secondary(usize),
}

/// Frozen per-node data, indexed by layout node slot.
#[derive(Debug, Clone, Copy)]
pub struct NodeGeometry {
    /// Particle slot.
    pub particle: usize,
    pub position: DVec2,
    /// Offset from the particle center.
    pub offset: DVec2,
    pub normal: DVec2,
    pub volume_element: f64,
    /// Length of the segment to the upper neighbour.
    pub upper_length: f64,
    /// Diffusion resistance `l/M` of the upper segment.
    pub upper_resistance: f64,
    /// Capillary driving force `∂E/∂u`.
    pub driving_force: f64,
    /// Node slot of the lower neighbour.
    pub lower: usize,
    /// Node slot of the upper neighbour.
    pub upper: usize,
    pub contact: ContactRole,
}

/// Compatibility constraint between two contacting nodes.
///
/// `C = u_p + sign·u_s + (V_P(r_p) − V_S(r_s))·n` with `sign = +1` for
/// grain-boundary pairs and `−1` for neck pairs.
#[derive(Debug, Clone, Copy)]
pub struct ContactConstraint {
    pub primary: usize,
    pub secondary: usize,
    pub primary_particle: usize,
    pub secondary_particle: usize,
    /// Normal of the primary node.
    pub direction: DVec2,
    pub primary_offset: DVec2,
    pub secondary_offset: DVec2,
    pub sign: f64,
}

/// All geometry of one state in normalized units.
#[derive(Debug, Clone)]
pub struct FrozenGeometry {
    pub frames: Vec<ParticleFrame>,
    pub nodes: Vec<NodeGeometry>,
    pub contacts: Vec<ContactConstraint>,
    /// True when every particle center sits at the origin.
    pub centered: bool,
}

impl FrozenGeometry {
    /// Computes the geometry of `state`, which must match `layout`.
    pub fn build(
        state: &SystemState,
        layout: &UnknownLayout,
        materials: &NormalizedMaterials,
    ) -> SinterResult<Self> {
        if !layout.matches(state) {
            return Err(SinterError::LayoutMismatch(
                "state population differs from the unknown layout".into(),
            ));
        }

        let frames: Vec<ParticleFrame> = state.particles().iter().map(ParticleFrame::of).collect();
        let centered = frames.iter().map(|f| f.radius * f.radius).sum::<f64>()
            < sinter_types::constants::EPSILON;

        let mut starts = Vec::with_capacity(state.particle_count());
        let mut next = 0;
        for particle in state.particles() {
            starts.push(next);
            next += particle.node_count();
        }

        let mut nodes: Vec<NodeGeometry> = state
            .particles()
            .par_iter()
            .enumerate()
            .map(|(slot, particle)| {
                (0..particle.node_count())
                    .map(|i| {
                        let frame = &frames[slot];
                        node_geometry(state, materials, frame, slot, particle, i, starts[slot])
                    })
                    .collect::<SinterResult<Vec<_>>>()
            })
            .collect::<SinterResult<Vec<Vec<_>>>>()?
            .into_iter()
            .flatten()
            .collect();

        let mut contacts = Vec::new();
        for pair in contact_pairs(state) {
            let slots = (layout.node_slot(pair.primary), layout.node_slot(pair.secondary));
            let (primary, secondary) = match slots {
                (Some(p), Some(s)) => (p, s),
                _ => {
                    return Err(SinterError::LayoutMismatch(format!(
                        "contact {}/{} is not part of the layout",
                        pair.primary, pair.secondary
                    )))
                }
            };
            let k = contacts.len();
            nodes[primary].contact = ContactRole::Primary(k);
            nodes[secondary].contact = ContactRole::Secondary(k);
            contacts.push(ContactConstraint {
                primary,
                secondary,
                primary_particle: nodes[primary].particle,
                secondary_particle: nodes[secondary].particle,
                direction: nodes[primary].normal,
                primary_offset: nodes[primary].offset,
                secondary_offset: nodes[secondary].offset,
                sign: match pair.kind {
                    ContactKind::GrainBoundary => 1.0,
                    ContactKind::Neck => -1.0,
                },
            });
        }

        Ok(Self {
            frames,
            nodes,
            contacts,
            centered,
        })
    }
}

/// Kinetics of the segment from ring position `i` to its upper neighbour.
///
/// Grain-boundary segments carry half the interface energy, one half per
/// adjoining particle.
fn segment_kinetics(
    state: &SystemState,
    materials: &NormalizedMaterials,
    particle: &Particle,
    i: usize,
) -> SinterResult<Kinetics> {
    let node = &particle.nodes()[i];
    let upper = particle.upper_of(i);
    if !is_interface_segment(node.kind, upper.kind) {
        return materials.surface(particle.material);
    }
    let partner = [node, upper]
        .iter()
        .filter(|n| n.kind == NodeKind::GrainBoundary)
        .chain([node, upper].iter())
        .find_map(|n| n.contact);
    let partner_material = partner
        .and_then(|id| state.locate(id))
        .map_or(particle.material, |(p, _)| p.material);
    let interface = materials.interface(particle.material, partner_material)?;
    Ok(Kinetics {
        energy: 0.5 * interface.energy,
        mobility: interface.mobility,
    })
}

fn node_geometry(
    state: &SystemState,
    materials: &NormalizedMaterials,
    frame: &ParticleFrame,
    slot: usize,
    particle: &Particle,
    i: usize,
    first_slot: usize,
) -> SinterResult<NodeGeometry> {
    let len = particle.node_count();
    let lower = (i + len - 1) % len;
    let upper = (i + 1) % len;
    let position = particle.node_position_at(i);
    let p_lo = particle.node_position_at(lower);
    let p_up = particle.node_position_at(upper);

    let SurfaceFrame {
        normal,
        volume_element,
    } = surface_frame(particle, i)?;

    let up = segment_kinetics(state, materials, particle, i)?;
    let lo = segment_kinetics(state, materials, particle, lower)?;
    let (to_upper, upper_length) = unit(position - p_up, "segment")?;
    let (to_lower, _) = unit(position - p_lo, "segment")?;
    let driving_force = up.energy * normal.dot(to_upper) + lo.energy * normal.dot(to_lower);

    let geometry = NodeGeometry {
        particle: slot,
        position,
        offset: position - frame.center,
        normal,
        volume_element,
        upper_length,
        upper_resistance: upper_length / up.mobility,
        driving_force,
        lower: first_slot + lower,
        upper: first_slot + upper,
        contact: ContactRole::Free,
    };
    if !(geometry.volume_element.is_finite()
        && geometry.upper_resistance.is_finite()
        && geometry.driving_force.is_finite())
    {
        return Err(SinterError::InvalidState(format!(
            "non-finite geometry at node {} of particle {}",
            particle.nodes()[i].id,
            particle.id
        )));
    }
    Ok(geometry)
}
