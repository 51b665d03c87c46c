//! Immutable system snapshots.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sinter_math::DVec2;
use sinter_types::{NodeId, ParticleId, SinterError, SinterResult};

use crate::node::{Node, NodeKind};
use crate::particle::Particle;

/// Where a node lives inside a [`SystemState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLocation {
    /// Position of the owning particle in [`SystemState::particles`].
    pub particle: usize,
    /// Ring position within the particle.
    pub node: usize,
}

/// Snapshot of the simulation at one point in time.
///
/// Construction validates every invariant the solver relies on, so a
/// `SystemState` in hand is always structurally sound:
/// - particle ids and node ids are unique across the system
/// - every ring is closed and consistent
/// - contact references are mutual, join nodes of the same non-surface
///   kind, and never stay within one particle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSystemState")]
pub struct SystemState {
    time: f64,
    particles: Vec<Particle>,
    #[serde(skip)]
    locations: HashMap<NodeId, NodeLocation>,
}

#[derive(Deserialize)]
struct RawSystemState {
    time: f64,
    particles: Vec<Particle>,
}

impl TryFrom<RawSystemState> for SystemState {
    type Error = SinterError;

    fn try_from(raw: RawSystemState) -> SinterResult<Self> {
        SystemState::new(raw.time, raw.particles)
    }
}

impl SystemState {
    pub fn new(time: f64, particles: Vec<Particle>) -> SinterResult<Self> {
        if !time.is_finite() {
            return Err(SinterError::InvalidState(format!("time is {time}")));
        }

        let mut particle_ids = HashSet::with_capacity(particles.len());
        let mut locations = HashMap::new();
        for (p, particle) in particles.iter().enumerate() {
            if !particle_ids.insert(particle.id) {
                return Err(SinterError::MalformedRing(format!(
                    "duplicate particle id {}",
                    particle.id
                )));
            }
            if !particle.is_finite() {
                return Err(SinterError::InvalidState(format!(
                    "particle {} has non-finite coordinates",
                    particle.id
                )));
            }
            for (i, node) in particle.nodes().iter().enumerate() {
                let location = NodeLocation { particle: p, node: i };
                if locations.insert(node.id, location).is_some() {
                    return Err(SinterError::MalformedRing(format!(
                        "node id {} is used on more than one ring",
                        node.id
                    )));
                }
            }
        }

        let state = Self {
            time,
            particles,
            locations,
        };
        state.check_contacts()?;
        Ok(state)
    }

    fn check_contacts(&self) -> SinterResult<()> {
        for particle in &self.particles {
            for node in particle.nodes() {
                let Some(partner_id) = node.contact else {
                    continue;
                };
                if node.kind == NodeKind::Surface {
                    return Err(SinterError::InvalidContact(format!(
                        "surface node {} carries a contact reference",
                        node.id
                    )));
                }
                let (partner_particle, partner) = self.locate(partner_id).ok_or_else(|| {
                    SinterError::InvalidContact(format!(
                        "{} refers to unknown node {partner_id}",
                        node.id
                    ))
                })?;
                if partner_particle.id == particle.id {
                    return Err(SinterError::InvalidContact(format!(
                        "{} and {partner_id} are on the same particle {}",
                        node.id, particle.id
                    )));
                }
                if partner.contact != Some(node.id) {
                    return Err(SinterError::InvalidContact(format!(
                        "{} refers to {partner_id}, which does not refer back",
                        node.id
                    )));
                }
                if partner.kind != node.kind {
                    return Err(SinterError::InvalidContact(format!(
                        "{} ({:?}) paired with {partner_id} ({:?})",
                        node.id, node.kind, partner.kind
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fails unless every neck and grain-boundary node has a contact partner.
    pub fn require_contacts(&self) -> SinterResult<()> {
        for particle in &self.particles {
            for node in particle.nodes() {
                if node.kind.needs_contact() && node.contact.is_none() {
                    return Err(SinterError::InvalidContact(format!(
                        "{:?} node {} on particle {} has no contact partner",
                        node.kind, node.id, particle.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Same particles at another time.
    pub fn with_time(&self, time: f64) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.iter().find(|p| p.id == id)
    }

    pub fn location(&self, id: NodeId) -> Option<NodeLocation> {
        self.locations.get(&id).copied()
    }

    /// Owning particle and node of a node id.
    pub fn locate(&self, id: NodeId) -> Option<(&Particle, &Node)> {
        let location = self.location(id)?;
        let particle = &self.particles[location.particle];
        Some((particle, &particle.nodes()[location.node]))
    }

    /// Absolute position of a node.
    pub fn node_position(&self, id: NodeId) -> Option<DVec2> {
        let location = self.location(id)?;
        Some(self.particles[location.particle].node_position_at(location.node))
    }

    pub fn node_count(&self) -> usize {
        self.locations.len()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Whether `other` has the same particles and nodes in the same order.
    pub fn same_population(&self, other: &SystemState) -> bool {
        self.particles.len() == other.particles.len()
            && self
                .particles
                .iter()
                .zip(&other.particles)
                .all(|(a, b)| {
                    a.id == b.id
                        && a.node_count() == b.node_count()
                        && a.nodes().iter().zip(b.nodes()).all(|(x, y)| x.id == y.id)
                })
    }
}
