//! Surface nodes.

use serde::{Deserialize, Serialize};
use sinter_math::PolarCoordinates;
use sinter_types::NodeId;

/// Classification of a node on a particle ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Free surface exposed to the pore space.
    Surface,
    /// Triple point where a free surface meets a grain boundary.
    Neck,
    /// Point on the interface shared with a neighbouring particle.
    GrainBoundary,
}

impl NodeKind {
    /// Whether nodes of this kind must pair with a node on another particle.
    pub fn needs_contact(self) -> bool {
        !matches!(self, Self::Surface)
    }
}

/// A node on a particle's surface ring.
///
/// Coordinates are polar, relative to the particle center, in the
/// particle's body frame (before applying the particle rotation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub coordinates: PolarCoordinates,
    /// Clockwise neighbour.
    pub lower: NodeId,
    /// Counter-clockwise neighbour.
    pub upper: NodeId,
    /// Coincident node on a neighbouring particle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<NodeId>,
}

impl Node {
    pub fn new(
        id: NodeId,
        kind: NodeKind,
        coordinates: PolarCoordinates,
        lower: NodeId,
        upper: NodeId,
    ) -> Self {
        Self {
            id,
            kind,
            coordinates,
            lower,
            upper,
            contact: None,
        }
    }

    pub fn with_contact(mut self, partner: NodeId) -> Self {
        self.contact = Some(partner);
        self
    }
}
