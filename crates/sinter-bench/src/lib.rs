//! # sinter-bench
//!
//! Benchmark suite for the sintering solver.
//!
//! Provides procedural particle-cluster scenarios, a runner for single and
//! parallel batch runs, and densification metrics with CSV export for
//! regression tracking.

pub mod metrics;
pub mod runner;
pub mod scenarios;

pub use metrics::{mean_center_distance, mean_neck_width, BenchmarkMetrics};
pub use runner::BenchmarkRunner;
pub use scenarios::{Scenario, ScenarioKind};
