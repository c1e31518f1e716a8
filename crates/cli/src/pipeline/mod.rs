//! Benchmark orchestration module.

mod orchestrator;
mod stats;
mod strategy;

pub use orchestrator::Harness;
pub use stats::{failed_modes, print_summary, write_json};
