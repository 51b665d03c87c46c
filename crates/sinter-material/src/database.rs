//! Material tables and built-in presets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sinter_types::{MaterialId, SinterError, SinterResult};

use crate::interface::{DihedralAngle, InterfaceProperties};
use crate::properties::MaterialProperties;

/// A material together with the id particles refer to it by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub id: MaterialId,
    pub material: MaterialProperties,
}

/// Materials of one run plus explicit interfaces between different materials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialTable {
    pub materials: Vec<MaterialEntry>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceProperties>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding one material under id 0.
    pub fn single(material: MaterialProperties) -> Self {
        Self::new().with_material(MaterialId(0), material)
    }

    /// Adds a material, replacing any previous entry with the same id.
    pub fn with_material(mut self, id: MaterialId, material: MaterialProperties) -> Self {
        self.materials.retain(|e| e.id != id);
        self.materials.push(MaterialEntry { id, material });
        self
    }

    pub fn with_interface(mut self, interface: InterfaceProperties) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn material(&self, id: MaterialId) -> SinterResult<&MaterialProperties> {
        self.materials
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.material)
            .ok_or_else(|| SinterError::MissingMaterial(format!("no material with id {id}")))
    }

    /// Interface between `a` and `b`.
    ///
    /// Explicit entries win; a material meeting itself falls back to its
    /// own grain-boundary data.
    pub fn interface(&self, a: MaterialId, b: MaterialId) -> SinterResult<InterfaceProperties> {
        if let Some(explicit) = self.interfaces.iter().find(|i| i.joins(a, b)) {
            return Ok(explicit.clone());
        }
        if a == b {
            return Ok(InterfaceProperties::homophase(a, self.material(a)?));
        }
        Err(SinterError::MissingMaterial(format!(
            "no interface between {a} and {b}"
        )))
    }

    /// Equilibrium dihedral angle between `a` and `b`, surface angles ordered as the arguments.
    pub fn dihedral_angle(&self, a: MaterialId, b: MaterialId) -> SinterResult<DihedralAngle> {
        let interface = self.interface(a, b)?;
        interface.dihedral_angle(self.material(a)?, self.material(b)?)
    }

    /// Validates every material and every explicit interface.
    pub fn validate(&self) -> SinterResult<()> {
        if self.materials.is_empty() {
            return Err(SinterError::MissingMaterial("material table is empty".into()));
        }
        for (k, entry) in self.materials.iter().enumerate() {
            entry.material.validate()?;
            if self.materials[..k].iter().any(|e| e.id == entry.id) {
                return Err(SinterError::InvalidMaterial(format!(
                    "material id {} is defined twice",
                    entry.id
                )));
            }
        }
        for interface in &self.interfaces {
            if !interface.diffusion_coefficient.is_finite() || interface.diffusion_coefficient <= 0.0
            {
                return Err(SinterError::InvalidMaterial(format!(
                    "interface {}/{}: diffusion coefficient must be positive",
                    interface.first, interface.second
                )));
            }
            interface.dihedral_angle(
                self.material(interface.first)?,
                self.material(interface.second)?,
            )?;
        }
        Ok(())
    }
}

/// A named collection of material presets.
///
/// Custom materials can be registered at runtime.
#[derive(Debug, Clone)]
pub struct MaterialDatabase {
    materials: HashMap<String, MaterialProperties>,
}

impl MaterialDatabase {
    /// Creates a new database with the built-in presets.
    pub fn with_defaults() -> Self {
        let mut db = Self::empty();
        db.register(alumina());
        db.register(copper());
        db.register(zirconia());
        db
    }

    /// Creates an empty database.
    pub fn empty() -> Self {
        Self {
            materials: HashMap::new(),
        }
    }

    /// Registers a material. Overwrites if the name already exists.
    pub fn register(&mut self, props: MaterialProperties) {
        self.materials.insert(props.name.clone(), props);
    }

    /// Looks up a material by name. Returns `None` if not found.
    pub fn get(&self, name: &str) -> Option<&MaterialProperties> {
        self.materials.get(name)
    }

    /// Returns all registered material names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialDatabase {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ─── Built-in Presets ─────────────────────────────────────────────────

/// Alumina (α-Al₂O₃) near 1600 K.
fn alumina() -> MaterialProperties {
    MaterialProperties {
        name: "alumina".into(),
        molar_volume: 2.56e-5,
        surface_energy: 0.9,
        surface_diffusion_coefficient: 1.0e-23,
        vacancy_concentration: 1.0e-4,
        grain_boundary_energy: 0.45,
        grain_boundary_diffusion_coefficient: 2.0e-24,
    }
}

/// Copper near 1300 K. Fast surface transport.
fn copper() -> MaterialProperties {
    MaterialProperties {
        name: "copper".into(),
        molar_volume: 7.11e-6,
        surface_energy: 1.7,
        surface_diffusion_coefficient: 5.0e-20,
        vacancy_concentration: 1.0e-4,
        grain_boundary_energy: 0.6,
        grain_boundary_diffusion_coefficient: 1.0e-21,
    }
}

/// Yttria-stabilized zirconia near 1600 K.
fn zirconia() -> MaterialProperties {
    MaterialProperties {
        name: "zirconia".into(),
        molar_volume: 2.2e-5,
        surface_energy: 1.1,
        surface_diffusion_coefficient: 2.0e-23,
        vacancy_concentration: 1.0e-4,
        grain_boundary_energy: 0.5,
        grain_boundary_diffusion_coefficient: 4.0e-24,
    }
}
