//! # sinter-types
//!
//! Shared identifiers, error types, and physical constants
//! for the sinter TEP solver.
//!
//! This crate has zero domain logic. It defines the vocabulary
//! that all other sinter crates share.

pub mod constants;
pub mod error;
pub mod ids;

pub use error::{InterceptReason, SinterError, SinterResult};
pub use ids::{MaterialId, NodeId, ParticleId};
