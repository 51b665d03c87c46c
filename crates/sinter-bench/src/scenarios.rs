//! Benchmark scenarios.
//!
//! Each scenario is a circle cluster of one material held at a fixed
//! temperature. Durations are given in multiples of the cluster's
//! characteristic time, so a scenario covers the same stage of sintering
//! whatever its material or particle size.

use sinter_material::{MaterialDatabase, MaterialProperties, MaterialTable, ProcessConditions};
use sinter_model::generators::{three_particle_pore, two_particle_neck, ClusterResolution};
use sinter_model::SystemState;
use sinter_solver::{Norm, SessionInput, SolverConfig};
use sinter_types::{MaterialId, SinterError, SinterResult};

/// Available benchmark scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    /// Two particles forming one neck.
    TwoParticleNeck,
    /// Three particles around a closing pore.
    ThreeParticlePore,
}

impl ScenarioKind {
    /// Returns all scenario kinds.
    pub fn all() -> &'static [ScenarioKind] {
        &[ScenarioKind::TwoParticleNeck, ScenarioKind::ThreeParticlePore]
    }

    /// Returns a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::TwoParticleNeck => "two_particle_neck",
            ScenarioKind::ThreeParticlePore => "three_particle_pore",
        }
    }

    /// Looks a kind up by its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.name() == name)
    }
}

/// A fully specified benchmark scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub kind: ScenarioKind,
    /// Initial cluster (m).
    pub state: SystemState,
    pub materials: MaterialTable,
    /// Temperature of the hold. The duration is derived from
    /// `normalized_duration` when the session input is built.
    pub conditions: ProcessConditions,
    pub config: SolverConfig,
    /// Simulated time in multiples of the characteristic time.
    pub normalized_duration: f64,
}

/// Particle radius of the stock scenarios (m).
const RADIUS: f64 = 1.0e-6;
/// Hold temperature of the stock scenarios (K).
const TEMPERATURE: f64 = 1600.0;

fn alumina() -> SinterResult<MaterialProperties> {
    MaterialDatabase::with_defaults()
        .get("alumina")
        .cloned()
        .ok_or_else(|| SinterError::MissingMaterial("alumina preset".into()))
}

impl Scenario {
    /// Two alumina particles of 1 µm radius with centers 1.8 µm apart.
    pub fn two_particle_neck() -> SinterResult<Self> {
        let state = two_particle_neck(
            RADIUS,
            1.8 * RADIUS,
            ClusterResolution::for_radius(RADIUS, 60),
            MaterialId(0),
        )?;
        Ok(Self {
            kind: ScenarioKind::TwoParticleNeck,
            state,
            materials: MaterialTable::single(alumina()?),
            conditions: ProcessConditions::new(TEMPERATURE, 0.0),
            config: SolverConfig::default(),
            normalized_duration: 1.0e-2,
        })
    }

    /// Three alumina particles on a triangle of side 1.8 µm.
    pub fn three_particle_pore() -> SinterResult<Self> {
        let state = three_particle_pore(
            RADIUS,
            1.8 * RADIUS,
            ClusterResolution::for_radius(RADIUS, 60),
            MaterialId(0),
        )?;
        Ok(Self {
            kind: ScenarioKind::ThreeParticlePore,
            state,
            materials: MaterialTable::single(alumina()?),
            conditions: ProcessConditions::new(TEMPERATURE, 0.0),
            config: SolverConfig::default(),
            normalized_duration: 1.0e-2,
        })
    }

    /// Create a scenario by kind.
    pub fn from_kind(kind: ScenarioKind) -> SinterResult<Self> {
        match kind {
            ScenarioKind::TwoParticleNeck => Self::two_particle_neck(),
            ScenarioKind::ThreeParticlePore => Self::three_particle_pore(),
        }
    }

    /// Replaces the material of every particle.
    pub fn with_material(mut self, properties: MaterialProperties) -> Self {
        self.materials = MaterialTable::single(properties);
        self
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_normalized_duration(mut self, duration: f64) -> Self {
        self.normalized_duration = duration;
        self
    }

    /// Characteristic scales of this scenario.
    pub fn norm(&self) -> SinterResult<Norm> {
        Norm::from_reference(&self.state, &self.materials, &self.conditions)
    }

    /// Session input with the duration converted to seconds.
    pub fn session_input(&self) -> SinterResult<SessionInput> {
        let norm = self.norm()?;
        let mut conditions = self.conditions;
        conditions.duration = self.normalized_duration * norm.time;
        Ok(SessionInput {
            state: self.state.clone(),
            materials: self.materials.clone(),
            conditions,
            config: self.config.clone(),
        })
    }
}
