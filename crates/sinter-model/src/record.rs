//! Per-step output records.

use serde::{Deserialize, Serialize};
use sinter_math::DVec2;
use sinter_types::{NodeId, ParticleId};

/// What happened to one node over an accepted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStepRecord {
    pub node: NodeId,
    /// Displacement along the node normal.
    pub normal_displacement: f64,
    /// Volume transported to the upper neighbour.
    pub flux: f64,
    /// Local chemical potential (multiplier of volume conservation).
    pub chemical_potential: f64,
}

/// What happened to one particle over an accepted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleStepRecord {
    pub particle: ParticleId,
    /// Displacement of the center, absolute frame.
    pub displacement: DVec2,
    /// Change of the body-frame angle.
    pub rotation: f64,
    /// Change of the enclosed area.
    pub volume_change: f64,
    pub nodes: Vec<NodeStepRecord>,
}

/// Record of an accepted time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Sequence number of the accepted step, starting at 1.
    pub index: u64,
    /// Time at the end of the step.
    pub time: f64,
    pub step_width: f64,
    pub particles: Vec<ParticleStepRecord>,
}

impl StepRecord {
    /// Total area change over all particles.
    pub fn total_volume_change(&self) -> f64 {
        self.particles.iter().map(|p| p.volume_change).sum()
    }
}
