//! Unknown layout: the bijection between solver unknowns and vector indices.
//!
//! ```text
//! [ Λ | P0: dr ds dθ | P1: dr ds dθ | ... | N0: u j λ μ | N1: u j λ μ | ... ]
//! ```
//!
//! Particles follow state order, nodes follow particle order and then ring
//! order. The layout is immutable; a state with a different population needs
//! a new one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sinter_model::SystemState;
use sinter_types::{NodeId, ParticleId, SinterError, SinterResult};

/// Number of global unknowns.
pub const GLOBAL_UNKNOWNS: usize = 1;
/// Unknowns per particle.
pub const PARTICLE_UNKNOWNS: usize = 3;
/// Unknowns per node.
pub const NODE_UNKNOWNS: usize = 4;

/// System-wide unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalUnknown {
    /// Multiplier of the reference-frame (no net rotation) constraint.
    Lambda1,
}

impl GlobalUnknown {
    pub const ALL: [Self; GLOBAL_UNKNOWNS] = [Self::Lambda1];

    pub fn offset(self) -> usize {
        0
    }
}

/// Per-particle unknowns: rigid-body rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleUnknown {
    /// Center velocity along the radial direction of the center.
    RadialDisplacement,
    /// Center velocity along the angular direction of the center.
    AngularDisplacement,
    /// Angular velocity of the body frame.
    RotationDisplacement,
}

impl ParticleUnknown {
    pub const ALL: [Self; PARTICLE_UNKNOWNS] = [
        Self::RadialDisplacement,
        Self::AngularDisplacement,
        Self::RotationDisplacement,
    ];

    pub fn offset(self) -> usize {
        match self {
            Self::RadialDisplacement => 0,
            Self::AngularDisplacement => 1,
            Self::RotationDisplacement => 2,
        }
    }
}

/// Per-node unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeUnknown {
    /// Normal velocity of the node.
    Normal,
    /// Volume flux from the node to its upper neighbour.
    Flux,
    /// Multiplier of local volume conservation.
    LambdaVolume,
    /// Multiplier of the contact compatibility constraint.
    LambdaContact,
}

impl NodeUnknown {
    pub const ALL: [Self; NODE_UNKNOWNS] = [
        Self::Normal,
        Self::Flux,
        Self::LambdaVolume,
        Self::LambdaContact,
    ];

    pub fn offset(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Flux => 1,
            Self::LambdaVolume => 2,
            Self::LambdaContact => 3,
        }
    }
}

/// Identity of one entry of the unknown vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnknownKey {
    Global(GlobalUnknown),
    Particle(ParticleId, ParticleUnknown),
    Node(NodeId, NodeUnknown),
}

/// Index map of a solver unknown vector.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownLayout {
    particles: Vec<ParticleId>,
    nodes: Vec<NodeId>,
    particle_slots: HashMap<ParticleId, usize>,
    node_slots: HashMap<NodeId, usize>,
}

impl UnknownLayout {
    /// Builds a layout for the given particles and nodes, in that order.
    ///
    /// Duplicate identities are rejected.
    pub fn build(particles: Vec<ParticleId>, nodes: Vec<NodeId>) -> SinterResult<Self> {
        let mut particle_slots = HashMap::with_capacity(particles.len());
        for (slot, &id) in particles.iter().enumerate() {
            if particle_slots.insert(id, slot).is_some() {
                return Err(SinterError::LayoutMismatch(format!(
                    "particle {id} appears twice"
                )));
            }
        }
        let mut node_slots = HashMap::with_capacity(nodes.len());
        for (slot, &id) in nodes.iter().enumerate() {
            if node_slots.insert(id, slot).is_some() {
                return Err(SinterError::LayoutMismatch(format!("node {id} appears twice")));
            }
        }
        Ok(Self {
            particles,
            nodes,
            particle_slots,
            node_slots,
        })
    }

    /// Layout of a state: particles in state order, nodes in ring order.
    pub fn from_state(state: &SystemState) -> SinterResult<Self> {
        let particles = state.particles().iter().map(|p| p.id).collect();
        let nodes = state
            .particles()
            .iter()
            .flat_map(|p| p.nodes().iter().map(|n| n.id))
            .collect();
        Self::build(particles, nodes)
    }

    /// True when `state` has exactly this population in this order.
    pub fn matches(&self, state: &SystemState) -> bool {
        if state.particle_count() != self.particles.len() || state.node_count() != self.nodes.len()
        {
            return false;
        }
        let particles_match = state
            .particles()
            .iter()
            .zip(&self.particles)
            .all(|(p, &id)| p.id == id);
        let nodes_match = state
            .particles()
            .iter()
            .flat_map(|p| p.nodes())
            .zip(&self.nodes)
            .all(|(n, &id)| n.id == id);
        particles_match && nodes_match
    }

    /// Total number of unknowns.
    #[inline]
    pub fn len(&self) -> usize {
        GLOBAL_UNKNOWNS + PARTICLE_UNKNOWNS * self.particles.len() + NODE_UNKNOWNS * self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Particles in layout order.
    pub fn particles(&self) -> &[ParticleId] {
        &self.particles
    }

    /// Nodes in layout order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// First particle index.
    #[inline]
    pub fn particle_offset(&self) -> usize {
        GLOBAL_UNKNOWNS
    }

    /// First node index.
    #[inline]
    pub fn node_offset(&self) -> usize {
        GLOBAL_UNKNOWNS + PARTICLE_UNKNOWNS * self.particles.len()
    }

    #[inline]
    pub fn global_index(&self, kind: GlobalUnknown) -> usize {
        kind.offset()
    }

    /// Index of a particle unknown by particle slot.
    #[inline]
    pub fn particle_index_at(&self, slot: usize, kind: ParticleUnknown) -> usize {
        self.particle_offset() + PARTICLE_UNKNOWNS * slot + kind.offset()
    }

    /// Index of a node unknown by node slot.
    #[inline]
    pub fn node_index_at(&self, slot: usize, kind: NodeUnknown) -> usize {
        self.node_offset() + NODE_UNKNOWNS * slot + kind.offset()
    }

    pub fn particle_slot(&self, id: ParticleId) -> Option<usize> {
        self.particle_slots.get(&id).copied()
    }

    pub fn node_slot(&self, id: NodeId) -> Option<usize> {
        self.node_slots.get(&id).copied()
    }

    pub fn particle_index(&self, id: ParticleId, kind: ParticleUnknown) -> Option<usize> {
        self.particle_slot(id)
            .map(|slot| self.particle_index_at(slot, kind))
    }

    pub fn node_index(&self, id: NodeId, kind: NodeUnknown) -> Option<usize> {
        self.node_slot(id).map(|slot| self.node_index_at(slot, kind))
    }

    /// Index of an unknown, if its owner is part of this layout.
    pub fn index_of(&self, key: UnknownKey) -> Option<usize> {
        match key {
            UnknownKey::Global(kind) => Some(self.global_index(kind)),
            UnknownKey::Particle(id, kind) => self.particle_index(id, kind),
            UnknownKey::Node(id, kind) => self.node_index(id, kind),
        }
    }

    /// Inverse of [`index_of`](Self::index_of).
    pub fn key_at(&self, index: usize) -> Option<UnknownKey> {
        if index < self.particle_offset() {
            return GlobalUnknown::ALL.get(index).map(|&k| UnknownKey::Global(k));
        }
        if index < self.node_offset() {
            let local = index - self.particle_offset();
            let id = self.particles[local / PARTICLE_UNKNOWNS];
            return Some(UnknownKey::Particle(
                id,
                ParticleUnknown::ALL[local % PARTICLE_UNKNOWNS],
            ));
        }
        let local = index - self.node_offset();
        let id = *self.nodes.get(local / NODE_UNKNOWNS)?;
        Some(UnknownKey::Node(id, NodeUnknown::ALL[local % NODE_UNKNOWNS]))
    }
}
