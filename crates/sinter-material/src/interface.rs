//! Interfaces between particles and their equilibrium dihedral angle.

use serde::{Deserialize, Serialize};
use sinter_math::{CsrMatrix, NewtonRootFinder, ResidualFunction, RootFinder};
use sinter_types::{MaterialId, SinterError, SinterResult};

use crate::properties::MaterialProperties;

/// A grain boundary between particles of two (possibly equal) materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceProperties {
    pub first: MaterialId,
    pub second: MaterialId,
    /// Interface energy (J/m²).
    pub energy: f64,
    /// Thickness-weighted interface diffusion coefficient (m³/s).
    pub diffusion_coefficient: f64,
}

impl InterfaceProperties {
    /// Interface of a material with itself, from its grain-boundary data.
    pub fn homophase(id: MaterialId, material: &MaterialProperties) -> Self {
        Self {
            first: id,
            second: id,
            energy: material.grain_boundary_energy,
            diffusion_coefficient: material.grain_boundary_diffusion_coefficient,
        }
    }

    /// Whether this interface joins `a` and `b`, in either order.
    pub fn joins(&self, a: MaterialId, b: MaterialId) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }

    /// Solves the triple-point balance for the surface angles on both sides.
    ///
    /// The angles `θ_a`, `θ_b` between each free surface and the interface
    /// satisfy
    ///
    /// ```text
    /// γ_a·cos θ_a + γ_b·cos θ_b = γ_ab
    /// γ_a·sin θ_a = γ_b·sin θ_b
    /// ```
    ///
    /// and the dihedral angle is `θ_a + θ_b`.
    pub fn dihedral_angle(
        &self,
        first: &MaterialProperties,
        second: &MaterialProperties,
    ) -> SinterResult<DihedralAngle> {
        let balance = TriplePointBalance {
            first: first.surface_energy,
            second: second.surface_energy,
            interface: self.energy,
        };
        if self.energy <= 0.0 || self.energy >= balance.first + balance.second {
            return Err(SinterError::InvalidMaterial(format!(
                "interface energy {} between {} and {} admits no equilibrium neck",
                self.energy, first.name, second.name
            )));
        }

        let guess = (self.energy / (balance.first + balance.second)).acos();
        let solution = NewtonRootFinder::default().find_root(&balance, vec![guess, guess])?;
        let (theta_first, theta_second) = (solution.x[0], solution.x[1]);
        if !(0.0..=std::f64::consts::PI).contains(&theta_first)
            || !(0.0..=std::f64::consts::PI).contains(&theta_second)
        {
            return Err(SinterError::InvalidMaterial(format!(
                "dihedral balance between {} and {} converged to unphysical angles",
                first.name, second.name
            )));
        }
        Ok(DihedralAngle {
            first: theta_first,
            second: theta_second,
        })
    }
}

/// Equilibrium surface angles at a neck, measured from the interface (radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DihedralAngle {
    pub first: f64,
    pub second: f64,
}

impl DihedralAngle {
    /// Full dihedral angle.
    pub fn total(&self) -> f64 {
        self.first + self.second
    }
}

struct TriplePointBalance {
    first: f64,
    second: f64,
    interface: f64,
}

impl ResidualFunction for TriplePointBalance {
    fn dimension(&self) -> usize {
        2
    }

    fn residual(&self, x: &[f64]) -> SinterResult<Vec<f64>> {
        Ok(vec![
            self.first * x[0].cos() + self.second * x[1].cos() - self.interface,
            self.first * x[0].sin() - self.second * x[1].sin(),
        ])
    }

    fn jacobian(&self, x: &[f64]) -> SinterResult<CsrMatrix> {
        let triplets = [
            (0, 0, -self.first * x[0].sin()),
            (0, 1, -self.second * x[1].sin()),
            (1, 0, self.first * x[0].cos()),
            (1, 1, -self.second * x[1].cos()),
        ];
        Ok(CsrMatrix::from_triplets(2, 2, &triplets))
    }
}
