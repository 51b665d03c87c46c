//! # sinter-material
//!
//! Material data consumed by the sintering solver.
//!
//! - [`MaterialProperties`]: molar volume, energies, diffusion coefficients
//!   and vacancy concentration of one particle material.
//! - [`InterfaceProperties`]: grain boundaries between materials, with the
//!   equilibrium dihedral angle solved from the triple-point balance.
//! - [`MaterialTable`]: the materials of one run, keyed by [`MaterialId`].
//! - [`MaterialDatabase`]: named presets (alumina, copper, zirconia).
//! - [`ProcessConditions`]: temperature and duration of the hold.
//!
//! [`MaterialId`]: sinter_types::MaterialId

pub mod conditions;
pub mod database;
pub mod interface;
pub mod properties;

pub use conditions::ProcessConditions;
pub use database::{MaterialDatabase, MaterialEntry, MaterialTable};
pub use interface::{DihedralAngle, InterfaceProperties};
pub use properties::MaterialProperties;
