//! Lagrangian residual and Jacobian of the thermodynamic extremal principle.
//!
//! The unknowns are the rates of one step: rigid-body rates per particle,
//! normal velocity and flux per node, and the multipliers of volume
//! conservation, contact compatibility and the reference frame. Each
//! residual row is the derivative of the Lagrangian with respect to one
//! unknown. With the geometry frozen at the evaluated state the system is
//! linear, so Newton converges in a single iteration.
//!
//! # Rows
//!
//! | Unknown | Row |
//! |---|---|
//! | `Λ` | `Σ r_P·ds_P` (or `Λ` when every center is at the origin) |
//! | `dr_P` | `c_f·dr_P + Σ μ·∂C/∂dr_P` |
//! | `ds_P` | `c_f·ds_P + Σ μ·∂C/∂ds_P + Λ·r_P` |
//! | `dθ_P` | `c_f·ρ²·dθ_P + Σ μ·∂C/∂dθ_P` |
//! | `u_i` | `F_i + a_i·λ_i + Σ μ·∂C/∂u_i` |
//! | `j_i` | `(l_i/M_i)·j_i + λ_i − λ_up` |
//! | `λ_i` | `a_i·u_i + j_i − j_lo` |
//! | `μ_i` | `C` on the primary node of a contact, `μ_i` elsewhere |

use std::sync::Arc;

use rayon::prelude::*;
use sinter_math::polar::cross;
use sinter_math::{CsrMatrix, DVec2, ResidualFunction};
use sinter_model::SystemState;
use sinter_types::{SinterError, SinterResult};

use crate::geometry::{ContactConstraint, ContactRole, FrozenGeometry};
use crate::layout::{GlobalUnknown, NodeUnknown, ParticleUnknown, UnknownLayout, NODE_UNKNOWNS};
use crate::norm::NormalizedMaterials;

type Triplet = (usize, usize, f64);

/// Residual function of one stage, with geometry frozen at the stage state.
pub struct TepEvaluator {
    layout: Arc<UnknownLayout>,
    geometry: FrozenGeometry,
    friction: f64,
}

impl TepEvaluator {
    pub fn new(
        state: &SystemState,
        layout: Arc<UnknownLayout>,
        materials: &NormalizedMaterials,
        friction: f64,
    ) -> SinterResult<Self> {
        let geometry = FrozenGeometry::build(state, &layout, materials)?;
        Ok(Self {
            layout,
            geometry,
            friction,
        })
    }

    pub fn layout(&self) -> &Arc<UnknownLayout> {
        &self.layout
    }

    pub fn geometry(&self) -> &FrozenGeometry {
        &self.geometry
    }

    #[inline]
    fn particle_index(&self, slot: usize, kind: ParticleUnknown) -> usize {
        self.layout.particle_index_at(slot, kind)
    }

    #[inline]
    fn node_index(&self, slot: usize, kind: NodeUnknown) -> usize {
        self.layout.node_index_at(slot, kind)
    }

    /// Rigid-body velocity of a particle at `offset`, projected on `direction`.
    fn rigid_normal_velocity(&self, particle: usize, offset: DVec2, direction: DVec2, x: &[f64]) -> f64 {
        let frame = &self.geometry.frames[particle];
        let dr = x[self.particle_index(particle, ParticleUnknown::RadialDisplacement)];
        let ds = x[self.particle_index(particle, ParticleUnknown::AngularDisplacement)];
        let dtheta = x[self.particle_index(particle, ParticleUnknown::RotationDisplacement)];
        frame.velocity(dr, ds).dot(direction) + dtheta * cross(offset, direction)
    }

    /// Partial derivatives of `V(offset)·direction` with respect to `(dr, ds, dθ)`.
    fn rigid_gradient(&self, particle: usize, offset: DVec2, direction: DVec2) -> [(usize, f64); 3] {
        let frame = &self.geometry.frames[particle];
        [
            (
                self.particle_index(particle, ParticleUnknown::RadialDisplacement),
                frame.radial.dot(direction),
            ),
            (
                self.particle_index(particle, ParticleUnknown::AngularDisplacement),
                frame.angular.dot(direction),
            ),
            (
                self.particle_index(particle, ParticleUnknown::RotationDisplacement),
                cross(offset, direction),
            ),
        ]
    }

    fn constraint_value(&self, c: &ContactConstraint, x: &[f64]) -> f64 {
        let u_p = x[self.node_index(c.primary, NodeUnknown::Normal)];
        let u_s = x[self.node_index(c.secondary, NodeUnknown::Normal)];
        u_p + c.sign * u_s
            + self.rigid_normal_velocity(c.primary_particle, c.primary_offset, c.direction, x)
            - self.rigid_normal_velocity(c.secondary_particle, c.secondary_offset, c.direction, x)
    }

    fn constraint_multiplier(&self, c: &ContactConstraint, x: &[f64]) -> f64 {
        x[self.node_index(c.primary, NodeUnknown::LambdaContact)]
    }

    /// Rows of node `slot` into `rows` (`u`, `j`, `λ`, `μ` order).
    fn node_rows(&self, slot: usize, rows: &mut [f64], x: &[f64]) {
        let g = &self.geometry.nodes[slot];
        let u = x[self.node_index(slot, NodeUnknown::Normal)];
        let j = x[self.node_index(slot, NodeUnknown::Flux)];
        let lambda = x[self.node_index(slot, NodeUnknown::LambdaVolume)];
        let mu = x[self.node_index(slot, NodeUnknown::LambdaContact)];
        let lambda_up = x[self.node_index(g.upper, NodeUnknown::LambdaVolume)];
        let j_lo = x[self.node_index(g.lower, NodeUnknown::Flux)];

        let (contact_force, contact_row) = match g.contact {
            ContactRole::Free => (0.0, mu),
            ContactRole::Primary(k) => {
                let c = &self.geometry.contacts[k];
                (mu, self.constraint_value(c, x))
            }
            ContactRole::Secondary(k) => {
                let c = &self.geometry.contacts[k];
                (c.sign * self.constraint_multiplier(c, x), mu)
            }
        };

        rows[NodeUnknown::Normal.offset()] =
            g.driving_force + g.volume_element * lambda + contact_force;
        rows[NodeUnknown::Flux.offset()] = g.upper_resistance * j + lambda - lambda_up;
        rows[NodeUnknown::LambdaVolume.offset()] = g.volume_element * u + j - j_lo;
        rows[NodeUnknown::LambdaContact.offset()] = contact_row;
    }

    fn node_triplets(&self, slot: usize) -> Vec<Triplet> {
        let g = &self.geometry.nodes[slot];
        let row_u = self.node_index(slot, NodeUnknown::Normal);
        let row_j = self.node_index(slot, NodeUnknown::Flux);
        let row_lambda = self.node_index(slot, NodeUnknown::LambdaVolume);
        let row_mu = self.node_index(slot, NodeUnknown::LambdaContact);

        let mut triplets = vec![
            (row_u, row_lambda, g.volume_element),
            (row_j, row_j, g.upper_resistance),
            (row_j, row_lambda, 1.0),
            (row_j, self.node_index(g.upper, NodeUnknown::LambdaVolume), -1.0),
            (row_lambda, row_u, g.volume_element),
            (row_lambda, row_j, 1.0),
            (row_lambda, self.node_index(g.lower, NodeUnknown::Flux), -1.0),
        ];

        match g.contact {
            ContactRole::Free => triplets.push((row_mu, row_mu, 1.0)),
            ContactRole::Primary(k) => {
                let c = &self.geometry.contacts[k];
                triplets.push((row_u, row_mu, 1.0));
                triplets.push((row_mu, row_u, 1.0));
                triplets.push((row_mu, self.node_index(c.secondary, NodeUnknown::Normal), c.sign));
                for (col, value) in self.rigid_gradient(c.primary_particle, c.primary_offset, c.direction) {
                    triplets.push((row_mu, col, value));
                }
                for (col, value) in
                    self.rigid_gradient(c.secondary_particle, c.secondary_offset, c.direction)
                {
                    triplets.push((row_mu, col, -value));
                }
            }
            ContactRole::Secondary(k) => {
                let c = &self.geometry.contacts[k];
                triplets.push((row_u, self.node_index(c.primary, NodeUnknown::LambdaContact), c.sign));
                triplets.push((row_mu, row_mu, 1.0));
            }
        }
        triplets
    }

    fn check_dimension(&self, x: &[f64]) -> SinterResult<()> {
        if x.len() != self.layout.len() {
            return Err(SinterError::LayoutMismatch(format!(
                "expected {} unknowns, got {}",
                self.layout.len(),
                x.len()
            )));
        }
        Ok(())
    }
}

impl ResidualFunction for TepEvaluator {
    fn dimension(&self) -> usize {
        self.layout.len()
    }

    fn residual(&self, x: &[f64]) -> SinterResult<Vec<f64>> {
        self.check_dimension(x)?;
        let mut residual = vec![0.0; x.len()];
        let lambda1 = x[self.layout.global_index(GlobalUnknown::Lambda1)];

        residual[self.layout.global_index(GlobalUnknown::Lambda1)] = if self.geometry.centered {
            lambda1
        } else {
            self.geometry
                .frames
                .iter()
                .enumerate()
                .map(|(p, f)| f.radius * x[self.particle_index(p, ParticleUnknown::AngularDisplacement)])
                .sum()
        };

        for (p, frame) in self.geometry.frames.iter().enumerate() {
            let dr = self.particle_index(p, ParticleUnknown::RadialDisplacement);
            let ds = self.particle_index(p, ParticleUnknown::AngularDisplacement);
            let dtheta = self.particle_index(p, ParticleUnknown::RotationDisplacement);
            residual[dr] = self.friction * x[dr];
            residual[ds] = self.friction * x[ds];
            if !self.geometry.centered {
                residual[ds] += lambda1 * frame.radius;
            }
            residual[dtheta] = self.friction * frame.gyration * frame.gyration * x[dtheta];
        }

        for c in &self.geometry.contacts {
            let mu = self.constraint_multiplier(c, x);
            for (col, value) in self.rigid_gradient(c.primary_particle, c.primary_offset, c.direction) {
                residual[col] += mu * value;
            }
            for (col, value) in self.rigid_gradient(c.secondary_particle, c.secondary_offset, c.direction)
            {
                residual[col] -= mu * value;
            }
        }

        let node_offset = self.layout.node_offset();
        residual[node_offset..]
            .par_chunks_mut(NODE_UNKNOWNS)
            .enumerate()
            .for_each(|(slot, rows)| self.node_rows(slot, rows, x));

        if let Some(bad) = residual.iter().position(|v| !v.is_finite()) {
            return Err(SinterError::InvalidState(format!(
                "non-finite residual at row {bad}"
            )));
        }
        Ok(residual)
    }

    fn jacobian(&self, x: &[f64]) -> SinterResult<CsrMatrix> {
        self.check_dimension(x)?;
        let n = self.layout.len();
        let lambda1 = self.layout.global_index(GlobalUnknown::Lambda1);
        let mut triplets: Vec<Triplet> = Vec::new();

        if self.geometry.centered {
            triplets.push((lambda1, lambda1, 1.0));
        }
        for (p, frame) in self.geometry.frames.iter().enumerate() {
            let dr = self.particle_index(p, ParticleUnknown::RadialDisplacement);
            let ds = self.particle_index(p, ParticleUnknown::AngularDisplacement);
            let dtheta = self.particle_index(p, ParticleUnknown::RotationDisplacement);
            triplets.push((dr, dr, self.friction));
            triplets.push((ds, ds, self.friction));
            triplets.push((dtheta, dtheta, self.friction * frame.gyration * frame.gyration));
            if !self.geometry.centered {
                triplets.push((lambda1, ds, frame.radius));
                triplets.push((ds, lambda1, frame.radius));
            }
        }
        for c in &self.geometry.contacts {
            let mu = self.node_index(c.primary, NodeUnknown::LambdaContact);
            for (row, value) in self.rigid_gradient(c.primary_particle, c.primary_offset, c.direction) {
                triplets.push((row, mu, value));
            }
            for (row, value) in self.rigid_gradient(c.secondary_particle, c.secondary_offset, c.direction)
            {
                triplets.push((row, mu, -value));
            }
        }

        let node_triplets: Vec<Triplet> = (0..self.geometry.nodes.len())
            .into_par_iter()
            .flat_map_iter(|slot| self.node_triplets(slot))
            .collect();
        triplets.extend(node_triplets);

        if triplets.iter().any(|&(_, _, v)| !v.is_finite()) {
            return Err(SinterError::InvalidState("non-finite Jacobian entry".into()));
        }
        Ok(CsrMatrix::from_triplets(n, n, &triplets))
    }
}
