//! Physical material properties.
//!
//! Diffusion in sintering is confined to thin layers (the free surface
//! and the grain boundary), so diffusion coefficients are given as the
//! product `δ·D` of layer thickness and diffusivity, in m³/s.

use serde::{Deserialize, Serialize};
use sinter_types::{SinterError, SinterResult};

/// Properties of one particle material.
///
/// | Field | Unit |
/// |---|---|
/// | `molar_volume` | m³/mol |
/// | `surface_energy`, `grain_boundary_energy` | J/m² |
/// | `surface_diffusion_coefficient`, `grain_boundary_diffusion_coefficient` | m³/s |
/// | `vacancy_concentration` | site fraction |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// Human-readable name (e.g., "alumina").
    pub name: String,

    pub molar_volume: f64,

    /// Free surface energy.
    pub surface_energy: f64,

    /// Thickness-weighted surface diffusion coefficient `δ_s·D_s`.
    pub surface_diffusion_coefficient: f64,

    /// Equilibrium vacancy concentration.
    pub vacancy_concentration: f64,

    /// Energy of a grain boundary between two particles of this material.
    pub grain_boundary_energy: f64,

    /// Thickness-weighted grain-boundary diffusion coefficient `δ_b·D_b`.
    pub grain_boundary_diffusion_coefficient: f64,
}

impl MaterialProperties {
    /// Mobility `c_v·V_m·δD / (R·T)` for a thickness-weighted diffusion coefficient.
    pub fn mobility(&self, diffusion_coefficient: f64, temperature: f64, gas_constant: f64) -> f64 {
        self.vacancy_concentration * self.molar_volume * diffusion_coefficient
            / (gas_constant * temperature)
    }

    /// Surface mobility at the given temperature.
    pub fn surface_mobility(&self, temperature: f64, gas_constant: f64) -> f64 {
        self.mobility(self.surface_diffusion_coefficient, temperature, gas_constant)
    }

    /// Checks that every parameter is finite and strictly positive.
    pub fn validate(&self) -> SinterResult<()> {
        let fields = [
            ("molar_volume", self.molar_volume),
            ("surface_energy", self.surface_energy),
            ("surface_diffusion_coefficient", self.surface_diffusion_coefficient),
            ("vacancy_concentration", self.vacancy_concentration),
            ("grain_boundary_energy", self.grain_boundary_energy),
            (
                "grain_boundary_diffusion_coefficient",
                self.grain_boundary_diffusion_coefficient,
            ),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(SinterError::InvalidMaterial(format!(
                    "{}: {field} must be positive, got {value}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
