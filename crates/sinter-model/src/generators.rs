//! Circle-cluster generators for benchmarks and testing.
//!
//! Particles are circles of equal radius. Where two circles overlap, the
//! overlapping caps are replaced by the straight chord between the two
//! intersection points: the chord becomes a grain boundary, and its ends
//! become neck nodes shared by both particles.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, TAU};

use sinter_math::{DVec2, PolarCoordinates};
use sinter_types::{MaterialId, NodeId, ParticleId, SinterError, SinterResult};

use crate::node::{Node, NodeKind};
use crate::particle::Particle;
use crate::ring::MIN_RING_SIZE;
use crate::state::SystemState;

/// Node density of generated rings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterResolution {
    /// Target distance between consecutive surface nodes.
    pub surface_spacing: f64,
    /// Number of grain-boundary nodes between the two necks of a contact.
    pub grain_boundary_nodes: usize,
}

impl ClusterResolution {
    /// Spacing giving roughly `nodes_per_circle` nodes on a free circle.
    pub fn for_radius(radius: f64, nodes_per_circle: usize) -> Self {
        Self {
            surface_spacing: TAU * radius / nodes_per_circle.max(MIN_RING_SIZE) as f64,
            grain_boundary_nodes: 3,
        }
    }

    pub fn with_grain_boundary_nodes(mut self, count: usize) -> Self {
        self.grain_boundary_nodes = count;
        self
    }
}

struct ContactArc {
    neighbor: usize,
    direction: f64,
    half_angle: f64,
}

#[derive(Default)]
struct ArcIds {
    low_neck: Option<NodeId>,
    boundary: Vec<NodeId>,
    high_neck: Option<NodeId>,
}

/// Builds a cluster of equal circles centered at `centers`.
///
/// Every pair of overlapping circles is joined by a grain boundary with
/// explicit contact references. Fails when two centers coincide or when
/// the contact caps of one particle overlap each other.
pub fn circle_cluster(
    centers: &[DVec2],
    radius: f64,
    resolution: ClusterResolution,
    material: MaterialId,
) -> SinterResult<SystemState> {
    let spacing = resolution.surface_spacing;
    if !(radius > 0.0 && radius.is_finite() && spacing > 0.0 && spacing.is_finite()) {
        return Err(SinterError::InvalidConfig(format!(
            "radius ({radius}) and surface spacing ({}) must be positive",
            resolution.surface_spacing
        )));
    }

    let mut next_id = 0u32;
    let mut rings: Vec<Vec<Node>> = Vec::with_capacity(centers.len());
    let mut arc_ids: HashMap<(usize, usize), ArcIds> = HashMap::new();

    for (i, &center) in centers.iter().enumerate() {
        let arcs = contact_arcs(centers, i, radius)?;
        let on_circle = |angle: f64| center + radius * DVec2::new(angle.cos(), angle.sin());

        let mut points: Vec<(NodeKind, DVec2)> = Vec::new();
        let mut arc_slots: Vec<(usize, usize, Vec<usize>, usize)> = Vec::new();

        if arcs.is_empty() {
            let count = ((TAU * radius / resolution.surface_spacing).round() as usize)
                .max(MIN_RING_SIZE);
            for k in 0..count {
                points.push((NodeKind::Surface, on_circle(TAU * k as f64 / count as f64)));
            }
        }

        for (k, arc) in arcs.iter().enumerate() {
            let low_angle = arc.direction - arc.half_angle;
            let high_angle = arc.direction + arc.half_angle;
            let low = on_circle(low_angle);
            let high = on_circle(high_angle);

            let low_slot = points.len();
            points.push((NodeKind::Neck, low));
            let gb_count = resolution.grain_boundary_nodes;
            let boundary_slots: Vec<usize> = (1..=gb_count)
                .map(|m| {
                    let t = m as f64 / (gb_count + 1) as f64;
                    points.push((NodeKind::GrainBoundary, low.lerp(high, t)));
                    points.len() - 1
                })
                .collect();
            let high_slot = points.len();
            points.push((NodeKind::Neck, high));
            arc_slots.push((arc.neighbor, low_slot, boundary_slots, high_slot));

            let next = &arcs[(k + 1) % arcs.len()];
            let mut next_low = next.direction - next.half_angle;
            if k + 1 == arcs.len() {
                next_low += TAU;
            }
            let span = next_low - high_angle;
            let segments = ((radius * span / resolution.surface_spacing).round() as usize).max(3);
            for m in 1..segments {
                let angle = high_angle + span * m as f64 / segments as f64;
                points.push((NodeKind::Surface, on_circle(angle)));
            }
        }

        let ids: Vec<NodeId> = points
            .iter()
            .map(|_| {
                let id = NodeId(next_id);
                next_id += 1;
                id
            })
            .collect();
        let n = ids.len();
        let nodes = points
            .iter()
            .enumerate()
            .map(|(k, &(kind, position))| {
                Node::new(
                    ids[k],
                    kind,
                    PolarCoordinates::from_cartesian(position - center),
                    ids[(k + n - 1) % n],
                    ids[(k + 1) % n],
                )
            })
            .collect();
        rings.push(nodes);

        for (neighbor, low_slot, boundary_slots, high_slot) in arc_slots {
            arc_ids.insert(
                (i, neighbor),
                ArcIds {
                    low_neck: Some(ids[low_slot]),
                    boundary: boundary_slots.iter().map(|&s| ids[s]).collect(),
                    high_neck: Some(ids[high_slot]),
                },
            );
        }
    }

    // Seen from the neighbour, the shared chord runs the other way round.
    let mut partners: HashMap<NodeId, NodeId> = HashMap::new();
    for (&(i, j), ours) in &arc_ids {
        let Some(theirs) = arc_ids.get(&(j, i)) else {
            continue;
        };
        if let (Some(a), Some(b)) = (ours.low_neck, theirs.high_neck) {
            partners.insert(a, b);
        }
        if let (Some(a), Some(b)) = (ours.high_neck, theirs.low_neck) {
            partners.insert(a, b);
        }
        for (a, b) in ours.boundary.iter().zip(theirs.boundary.iter().rev()) {
            partners.insert(*a, *b);
        }
    }

    let particles = rings
        .into_iter()
        .enumerate()
        .map(|(i, mut nodes)| {
            for node in &mut nodes {
                node.contact = partners.get(&node.id).copied();
            }
            Particle::new(
                ParticleId(i as u32),
                material,
                PolarCoordinates::from_cartesian(centers[i]),
                0.0,
                nodes,
            )
        })
        .collect::<SinterResult<Vec<_>>>()?;

    SystemState::new(0.0, particles)
}

fn contact_arcs(centers: &[DVec2], i: usize, radius: f64) -> SinterResult<Vec<ContactArc>> {
    let center = centers[i];
    let mut arcs = Vec::new();
    for (j, &other) in centers.iter().enumerate() {
        if j == i {
            continue;
        }
        let offset = other - center;
        let distance = offset.length();
        if distance <= f64::EPSILON * radius {
            return Err(SinterError::InvalidConfig(format!(
                "particles {i} and {j} share a center"
            )));
        }
        if distance >= 2.0 * radius {
            continue;
        }
        arcs.push(ContactArc {
            neighbor: j,
            direction: offset.y.atan2(offset.x).rem_euclid(TAU),
            half_angle: (distance / (2.0 * radius)).acos(),
        });
    }
    arcs.sort_by(|a, b| a.direction.total_cmp(&b.direction));

    for (k, arc) in arcs.iter().enumerate() {
        let next = &arcs[(k + 1) % arcs.len()];
        let mut next_start = next.direction - next.half_angle;
        if k + 1 == arcs.len() {
            next_start += TAU;
        }
        if arcs.len() > 1 && next_start <= arc.direction + arc.half_angle {
            return Err(SinterError::InvalidConfig(format!(
                "contact caps of particle {i} with {} and {} overlap",
                arc.neighbor, next.neighbor
            )));
        }
    }
    Ok(arcs)
}

/// A single free circle of `node_count` nodes centered at the origin.
pub fn circle_particle(
    radius: f64,
    node_count: usize,
    material: MaterialId,
) -> SinterResult<SystemState> {
    circle_cluster(
        &[DVec2::ZERO],
        radius,
        ClusterResolution::for_radius(radius, node_count),
        material,
    )
}

/// Two particles on the x axis, `center_distance` apart, joined by a neck.
pub fn two_particle_neck(
    radius: f64,
    center_distance: f64,
    resolution: ClusterResolution,
    material: MaterialId,
) -> SinterResult<SystemState> {
    let half = 0.5 * center_distance;
    circle_cluster(
        &[DVec2::new(-half, 0.0), DVec2::new(half, 0.0)],
        radius,
        resolution,
        material,
    )
}

/// Three particles on an equilateral triangle of side `center_distance`
/// enclosing a pore.
pub fn three_particle_pore(
    radius: f64,
    center_distance: f64,
    resolution: ClusterResolution,
    material: MaterialId,
) -> SinterResult<SystemState> {
    let circumradius = center_distance / 3f64.sqrt();
    let centers: Vec<DVec2> = (0..3)
        .map(|k| {
            let angle = FRAC_PI_2 + TAU * k as f64 / 3.0;
            circumradius * DVec2::new(angle.cos(), angle.sin())
        })
        .collect();
    circle_cluster(&centers, radius, resolution, material)
}
