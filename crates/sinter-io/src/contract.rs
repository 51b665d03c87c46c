//! Simulation input/output contract types.
//!
//! These types define the I/O boundary of the sintering solver. A
//! [`SimulationFile`] is the TOML document the CLI runs; a
//! [`SimulationSummary`] is what it reports back.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sinter_material::{MaterialDatabase, MaterialTable, ProcessConditions};
use sinter_model::generators::{three_particle_pore, two_particle_neck, ClusterResolution};
use sinter_model::SystemState;
use sinter_solver::{SessionInput, SimulationOutcome, SolverConfig, Termination};
use sinter_types::{MaterialId, SinterError, SinterResult};

/// Initial geometry of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioSpec {
    /// Two equal circles joined by one neck.
    TwoParticleNeck {
        /// Particle radius (m).
        radius: f64,
        /// Distance between the centers (m), below `2 * radius`.
        center_distance: f64,
        #[serde(default = "default_nodes_per_circle")]
        nodes_per_circle: usize,
        #[serde(default = "default_grain_boundary_nodes")]
        grain_boundary_nodes: usize,
    },
    /// Three equal circles on a triangle, enclosing a pore.
    ThreeParticlePore {
        radius: f64,
        center_distance: f64,
        #[serde(default = "default_nodes_per_circle")]
        nodes_per_circle: usize,
        #[serde(default = "default_grain_boundary_nodes")]
        grain_boundary_nodes: usize,
    },
    /// A serialized [`SystemState`] (JSON).
    StateFile { path: PathBuf },
}

fn default_nodes_per_circle() -> usize {
    60
}

fn default_grain_boundary_nodes() -> usize {
    3
}

fn default_material() -> String {
    "alumina".to_string()
}

impl ScenarioSpec {
    /// Builds the initial state. Generated particles use `material`.
    pub fn build_state(&self, material: MaterialId) -> SinterResult<SystemState> {
        match self {
            Self::TwoParticleNeck {
                radius,
                center_distance,
                nodes_per_circle,
                grain_boundary_nodes,
            } => two_particle_neck(
                *radius,
                *center_distance,
                ClusterResolution::for_radius(*radius, *nodes_per_circle)
                    .with_grain_boundary_nodes(*grain_boundary_nodes),
                material,
            ),
            Self::ThreeParticlePore {
                radius,
                center_distance,
                nodes_per_circle,
                grain_boundary_nodes,
            } => three_particle_pore(
                *radius,
                *center_distance,
                ClusterResolution::for_radius(*radius, *nodes_per_circle)
                    .with_grain_boundary_nodes(*grain_boundary_nodes),
                material,
            ),
            Self::StateFile { path } => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content).map_err(|e| {
                    SinterError::Serialization(format!("state file {}: {e}", path.display()))
                })
            }
        }
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TwoParticleNeck { .. } => "two_particle_neck",
            Self::ThreeParticlePore { .. } => "three_particle_pore",
            Self::StateFile { .. } => "state_file",
        }
    }
}

/// Where and how results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSpec {
    /// JSON-lines file receiving states and step records.
    pub path: Option<PathBuf>,
    /// Keep every n-th state of the time series (the last one is always kept).
    pub state_stride: u64,
    /// Whether step records are written.
    pub steps: bool,
    /// JSON file receiving the [`SimulationSummary`].
    pub summary: Option<PathBuf>,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            path: None,
            state_stride: 1,
            steps: true,
            summary: None,
        }
    }
}

/// A complete run description, as stored in a TOML simulation file.
///
/// ```toml
/// material = "alumina"
///
/// [scenario]
/// kind = "two_particle_neck"
/// radius = 1.0e-6
/// center_distance = 1.8e-6
///
/// [conditions]
/// temperature = 1600.0
/// duration = 3600.0
///
/// [solver]
/// time_stepper = "four_stage"
///
/// [output]
/// path = "run.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFile {
    pub scenario: ScenarioSpec,
    /// Name of a [`MaterialDatabase`] preset used for every particle.
    #[serde(default = "default_material")]
    pub material: String,
    pub conditions: ProcessConditions,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputSpec,
}

impl SimulationFile {
    /// Parses a simulation file from TOML text.
    pub fn from_toml_str(content: &str) -> SinterResult<Self> {
        toml::from_str(content)
            .map_err(|e| SinterError::Serialization(format!("simulation file: {e}")))
    }

    /// Loads a simulation file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> SinterResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut file = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            file.resolve_paths(base);
        }
        Ok(file)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let ScenarioSpec::StateFile { path } = &mut self.scenario {
            resolve(path);
        }
        if let Some(path) = &mut self.output.path {
            resolve(path);
        }
        if let Some(path) = &mut self.output.summary {
            resolve(path);
        }
    }

    /// Serializes back to TOML.
    pub fn to_toml_string(&self) -> SinterResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SinterError::Serialization(format!("simulation file: {e}")))
    }

    /// Material table holding the named preset under id 0.
    pub fn material_table(&self) -> SinterResult<MaterialTable> {
        let db = MaterialDatabase::with_defaults();
        let material = db.get(&self.material).ok_or_else(|| {
            SinterError::MissingMaterial(format!(
                "unknown material '{}', available: {}",
                self.material,
                db.names().join(", ")
            ))
        })?;
        Ok(MaterialTable::single(material.clone()))
    }

    /// Builds the session input this file describes.
    pub fn session_input(&self) -> SinterResult<SessionInput> {
        let materials = self.material_table()?;
        let state = self.scenario.build_state(MaterialId(0))?;
        Ok(SessionInput {
            state,
            materials,
            conditions: self.conditions,
            config: self.solver.clone(),
        })
    }
}

/// Outcome of a run in report form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub success: bool,
    pub termination: Termination,
    pub error: Option<String>,
    /// Time of the first state (s).
    pub start_time: f64,
    /// Time of the last accepted state (s).
    pub final_time: f64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub recoveries: u64,
    /// Mean root-finder iterations per accepted step.
    pub mean_iterations: f64,
    pub particle_count: usize,
    pub node_count: usize,
    /// Wall-clock time of the run (s).
    pub wall_time_seconds: f64,
}

impl SimulationSummary {
    pub fn from_outcome(outcome: &SimulationOutcome, wall_time_seconds: f64) -> Self {
        let first = outcome.time_series.first();
        let last = outcome.final_state();
        let stats = outcome.statistics;
        Self {
            success: outcome.success,
            termination: outcome.termination.clone(),
            error: outcome.error.as_ref().map(|e| e.to_string()),
            start_time: first.map_or(0.0, SystemState::time),
            final_time: last.map_or(0.0, SystemState::time),
            accepted_steps: stats.accepted_steps,
            rejected_steps: stats.rejected_steps,
            recoveries: stats.recoveries,
            mean_iterations: if stats.accepted_steps > 0 {
                stats.root_iterations as f64 / stats.accepted_steps as f64
            } else {
                0.0
            },
            particle_count: last.map_or(0, SystemState::particle_count),
            node_count: last.map_or(0, SystemState::node_count),
            wall_time_seconds,
        }
    }

    /// Writes the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> SinterResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SinterError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
