//! # sinter-io
//!
//! Simulation input/output contract, input validation and file output.
//!
//! Defines the boundary types that external systems (CLI, batch scripts)
//! use to describe a sintering run and to read back its results.

pub mod contract;
pub mod store;
pub mod validator;

pub use contract::{OutputSpec, ScenarioSpec, SimulationFile, SimulationSummary};
pub use store::{read_records, JsonLinesStore, StoreRecord};
pub use validator::{validate_file, validate_input};
