//! # sinter-model
//!
//! Data model of a sintering particle cluster.
//!
//! ## Key Types
//!
//! - [`SystemState`]: immutable snapshot of time and particles, validated on construction.
//! - [`Particle`]: body frame (polar center, rotation) with a ring of [`Node`]s.
//! - [`ContactPair`]: coincident nodes of two particles, discovered or explicit.
//! - [`StepRecord`] and [`StateStore`]: per-step output and its sink.
//! - Circle-cluster generators for benchmark and test fixtures.

pub mod contacts;
pub mod generators;
pub mod node;
pub mod particle;
pub mod record;
pub mod ring;
pub mod state;
pub mod store;

pub use contacts::{contact_pairs, discover_contacts, ContactKind, ContactPair};
pub use node::{Node, NodeKind};
pub use particle::Particle;
pub use record::{NodeStepRecord, ParticleStepRecord, StepRecord};
pub use state::{NodeLocation, SystemState};
pub use store::{InMemoryStore, NullStore, StateStore};
