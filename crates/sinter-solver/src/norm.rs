//! Normalization of physical quantities.
//!
//! The solver works in units where the reference particle has unit mean
//! radius and its surface has unit energy and unit mobility. [`Norm`] holds
//! the characteristic scales and converts states, materials and step
//! records in both directions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sinter_material::{MaterialTable, ProcessConditions};
use sinter_math::PolarCoordinates;
use sinter_model::{NodeStepRecord, Particle, ParticleStepRecord, StepRecord, SystemState};
use sinter_types::{MaterialId, SinterError, SinterResult};

/// Characteristic scales of a run.
///
/// | Scale | Definition |
/// |---|---|
/// | `length` | mean node radius `L` of the reference particle |
/// | `time` | `L⁴·R·T / (c_v·V_m·δD_s·γ_s)` |
/// | `energy` | `γ_s·L²` |
/// | `mass` | `energy·time² / L²` |
/// | `substance` | `L³ / V_m` |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Norm {
    pub length: f64,
    pub time: f64,
    pub energy: f64,
    pub mass: f64,
    pub substance: f64,
    /// Reference surface energy `γ_s` (J/m²).
    pub surface_energy: f64,
    /// Reference surface mobility `c_v·V_m·δD_s / (R·T)`.
    pub mobility: f64,
}

impl Norm {
    /// Derives the scales from the first particle of `state`.
    pub fn from_reference(
        state: &SystemState,
        materials: &MaterialTable,
        conditions: &ProcessConditions,
    ) -> SinterResult<Self> {
        let reference = state.particles().first().ok_or_else(|| {
            SinterError::InvalidState("cannot normalize a state without particles".into())
        })?;
        let material = materials.material(reference.material)?;

        let length = reference.mean_node_radius();
        if !length.is_finite() || length <= 0.0 {
            return Err(SinterError::InvalidState(format!(
                "reference particle {} has degenerate mean radius {length}",
                reference.id
            )));
        }
        let gamma = material.surface_energy;
        let mobility = material.surface_mobility(conditions.temperature, conditions.gas_constant);
        let time = length.powi(4) / (mobility * gamma);
        let energy = gamma * length * length;
        let norm = Self {
            length,
            time,
            energy,
            mass: energy * time * time / (length * length),
            substance: length.powi(3) / material.molar_volume,
            surface_energy: gamma,
            mobility,
        };
        if ![norm.time, norm.mass, norm.substance, norm.mobility]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
        {
            return Err(SinterError::InvalidMaterial(format!(
                "material {} yields degenerate scales",
                material.name
            )));
        }
        Ok(norm)
    }

    #[inline]
    pub fn normalize_time(&self, time: f64) -> f64 {
        time / self.time
    }

    #[inline]
    pub fn denormalize_time(&self, time: f64) -> f64 {
        time * self.time
    }

    #[inline]
    pub fn normalize_length(&self, length: f64) -> f64 {
        length / self.length
    }

    #[inline]
    pub fn denormalize_length(&self, length: f64) -> f64 {
        length * self.length
    }

    /// Scales radii by `1/length` and time by `1/time`. Angles are unchanged.
    pub fn normalize_state(&self, state: &SystemState) -> SinterResult<SystemState> {
        self.rescale_state(state, 1.0 / self.length, 1.0 / self.time)
    }

    /// Inverse of [`normalize_state`](Self::normalize_state).
    pub fn denormalize_state(&self, state: &SystemState) -> SinterResult<SystemState> {
        self.rescale_state(state, self.length, self.time)
    }

    fn rescale_state(
        &self,
        state: &SystemState,
        length_factor: f64,
        time_factor: f64,
    ) -> SinterResult<SystemState> {
        let scale = |c: PolarCoordinates| PolarCoordinates::new(c.r * length_factor, c.phi);
        let particles = state
            .particles()
            .iter()
            .map(|p| {
                let coordinates: Vec<PolarCoordinates> =
                    p.nodes().iter().map(|n| scale(n.coordinates)).collect();
                p.moved(scale(p.center), p.rotation, &coordinates)
            })
            .collect::<SinterResult<Vec<Particle>>>()?;
        SystemState::new(state.time() * time_factor, particles)
    }

    /// Converts a step record from normalized to physical units.
    pub fn denormalize_record(&self, record: &StepRecord) -> StepRecord {
        let area = self.length * self.length;
        let potential = self.surface_energy / self.length;
        StepRecord {
            index: record.index,
            time: self.denormalize_time(record.time),
            step_width: self.denormalize_time(record.step_width),
            particles: record
                .particles
                .iter()
                .map(|p| ParticleStepRecord {
                    particle: p.particle,
                    displacement: p.displacement * self.length,
                    rotation: p.rotation,
                    volume_change: p.volume_change * area,
                    nodes: p
                        .nodes
                        .iter()
                        .map(|n| NodeStepRecord {
                            node: n.node,
                            normal_displacement: n.normal_displacement * self.length,
                            flux: n.flux * area,
                            chemical_potential: n.chemical_potential * potential,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Normalized energies and mobilities of every material and every
    /// resolvable interface of `table`.
    pub fn normalize_materials(
        &self,
        table: &MaterialTable,
        conditions: &ProcessConditions,
    ) -> SinterResult<NormalizedMaterials> {
        let (temperature, gas_constant) = (conditions.temperature, conditions.gas_constant);
        let mut surfaces = HashMap::new();
        for entry in &table.materials {
            let m = &entry.material;
            surfaces.insert(
                entry.id,
                Kinetics {
                    energy: m.surface_energy / self.surface_energy,
                    mobility: m.surface_mobility(temperature, gas_constant) / self.mobility,
                },
            );
        }

        let mut interfaces = HashMap::new();
        for (k, a) in table.materials.iter().enumerate() {
            for b in &table.materials[k..] {
                let interface = match table.interface(a.id, b.id) {
                    Ok(interface) => interface,
                    Err(SinterError::MissingMaterial(_)) => continue,
                    Err(e) => return Err(e),
                };
                let vacancies =
                    0.5 * (a.material.vacancy_concentration + b.material.vacancy_concentration);
                let molar_volume = 0.5 * (a.material.molar_volume + b.material.molar_volume);
                let mobility = vacancies * molar_volume * interface.diffusion_coefficient
                    / (gas_constant * temperature);
                interfaces.insert(
                    interface_key(a.id, b.id),
                    Kinetics {
                        energy: interface.energy / self.surface_energy,
                        mobility: mobility / self.mobility,
                    },
                );
            }
        }

        Ok(NormalizedMaterials {
            surfaces,
            interfaces,
        })
    }
}

/// Normalized energy and mobility of a surface or interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinetics {
    pub energy: f64,
    pub mobility: f64,
}

/// Material data in normalized units, as the evaluator consumes it.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMaterials {
    surfaces: HashMap<MaterialId, Kinetics>,
    interfaces: HashMap<(MaterialId, MaterialId), Kinetics>,
}

fn interface_key(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl NormalizedMaterials {
    /// Free-surface kinetics of a material.
    pub fn surface(&self, id: MaterialId) -> SinterResult<Kinetics> {
        self.surfaces
            .get(&id)
            .copied()
            .ok_or_else(|| SinterError::MissingMaterial(format!("no material with id {id}")))
    }

    /// Interface kinetics between two materials, in either order.
    pub fn interface(&self, a: MaterialId, b: MaterialId) -> SinterResult<Kinetics> {
        self.interfaces
            .get(&interface_key(a, b))
            .copied()
            .ok_or_else(|| SinterError::MissingMaterial(format!("no interface between {a} and {b}")))
    }

    /// Largest `mobility·energy` over every surface and interface.
    pub fn max_diffusivity(&self) -> f64 {
        self.surfaces
            .values()
            .chain(self.interfaces.values())
            .map(|k| k.mobility * k.energy)
            .fold(0.0, f64::max)
    }
}
