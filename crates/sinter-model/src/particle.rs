//! Particles: a rigid body frame carrying a ring of surface nodes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sinter_math::{DVec2, PolarCoordinates};
use sinter_types::{MaterialId, NodeId, ParticleId, SinterError, SinterResult};

use crate::node::Node;
use crate::ring::{check_ring, lower_index, upper_index};

/// A particle of the cluster.
///
/// The center is stored in polar coordinates about the system origin,
/// the rotation is the angle of the body frame. Nodes are kept in ring
/// order: position `i + 1` is always the upper neighbour of position `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawParticle")]
pub struct Particle {
    pub id: ParticleId,
    pub material: MaterialId,
    pub center: PolarCoordinates,
    pub rotation: f64,
    nodes: Vec<Node>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

#[derive(Deserialize)]
struct RawParticle {
    id: ParticleId,
    material: MaterialId,
    center: PolarCoordinates,
    rotation: f64,
    nodes: Vec<Node>,
}

impl TryFrom<RawParticle> for Particle {
    type Error = SinterError;

    fn try_from(raw: RawParticle) -> SinterResult<Self> {
        Particle::new(raw.id, raw.material, raw.center, raw.rotation, raw.nodes)
    }
}

impl Particle {
    /// Builds a particle, checking its ring and storing nodes in ring order.
    pub fn new(
        id: ParticleId,
        material: MaterialId,
        center: PolarCoordinates,
        rotation: f64,
        nodes: Vec<Node>,
    ) -> SinterResult<Self> {
        let order = check_ring(&nodes).map_err(|e| match e {
            SinterError::MalformedRing(msg) => {
                SinterError::MalformedRing(format!("particle {id}: {msg}"))
            }
            other => other,
        })?;

        let mut slots: Vec<Option<Node>> = nodes.into_iter().map(Some).collect();
        let ordered: Vec<Node> = order.iter().filter_map(|&i| slots[i].take()).collect();
        let index = ordered
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        Ok(Self {
            id,
            material,
            center,
            rotation,
            nodes: ordered,
            index,
        })
    }

    /// Same particle and topology with new kinematics and node coordinates.
    ///
    /// `coordinates` must be given in ring order, one per node.
    pub fn moved(
        &self,
        center: PolarCoordinates,
        rotation: f64,
        coordinates: &[PolarCoordinates],
    ) -> SinterResult<Self> {
        if coordinates.len() != self.nodes.len() {
            return Err(SinterError::LayoutMismatch(format!(
                "particle {} has {} nodes, got {} coordinates",
                self.id,
                self.nodes.len(),
                coordinates.len()
            )));
        }
        let nodes = self
            .nodes
            .iter()
            .zip(coordinates)
            .map(|(node, &coordinates)| Node {
                coordinates,
                ..node.clone()
            })
            .collect();
        Ok(Self {
            id: self.id,
            material: self.material,
            center,
            rotation,
            nodes,
            index: self.index.clone(),
        })
    }

    /// Nodes in ring order.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ring position of a node.
    pub fn ring_index(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.ring_index(id).map(|i| &self.nodes[i])
    }

    /// Clockwise neighbour of the node at ring position `i`.
    #[inline]
    pub fn lower_of(&self, i: usize) -> &Node {
        &self.nodes[lower_index(self.nodes.len(), i)]
    }

    /// Counter-clockwise neighbour of the node at ring position `i`.
    #[inline]
    pub fn upper_of(&self, i: usize) -> &Node {
        &self.nodes[upper_index(self.nodes.len(), i)]
    }

    /// Center position in the absolute frame.
    #[inline]
    pub fn center_position(&self) -> DVec2 {
        self.center.to_cartesian()
    }

    /// Offset of the node at ring position `i` from the center, absolute frame.
    #[inline]
    pub fn node_offset_at(&self, i: usize) -> DVec2 {
        self.nodes[i].coordinates.to_cartesian_rotated(self.rotation)
    }

    /// Absolute position of the node at ring position `i`.
    #[inline]
    pub fn node_position_at(&self, i: usize) -> DVec2 {
        self.center_position() + self.node_offset_at(i)
    }

    /// Absolute positions of all nodes in ring order.
    pub fn node_positions(&self) -> Vec<DVec2> {
        (0..self.nodes.len()).map(|i| self.node_position_at(i)).collect()
    }

    /// Mean distance of the nodes from the particle center.
    pub fn mean_node_radius(&self) -> f64 {
        self.nodes.iter().map(|n| n.coordinates.r).sum::<f64>() / self.nodes.len() as f64
    }

    /// Enclosed area of the ring polygon (shoelace formula).
    pub fn area(&self) -> f64 {
        let points = self.node_positions();
        let n = points.len();
        0.5 * (0..n)
            .map(|i| {
                let a = points[i];
                let b = points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum::<f64>()
    }

    /// Length of the shortest segment between ring neighbours.
    pub fn min_segment_length(&self) -> f64 {
        let points = self.node_positions();
        let n = points.len();
        (0..n)
            .map(|i| points[i].distance(points[(i + 1) % n]))
            .fold(f64::INFINITY, f64::min)
    }

    /// True when the center, rotation and every node coordinate are finite.
    pub fn is_finite(&self) -> bool {
        self.center.is_finite()
            && self.rotation.is_finite()
            && self.nodes.iter().all(|n| n.coordinates.is_finite())
    }

    pub(crate) fn set_contact(&mut self, i: usize, partner: Option<NodeId>) {
        self.nodes[i].contact = partner;
    }
}
