//! # Generator
//!
//! Synthetic banking event production.
//!
//! Responsibilities:
//! - Produce `Event`s with strictly increasing ids and non-decreasing timestamps
//! - Lazy streams (bounded or unbounded) and one-shot batches
//! - Reproducible output when seeded
//!
//! ## Usage Example
//!
//! ```ignore
//! use generator::{EventGenerator, GeneratorConfig};
//!
//! let mut generator = EventGenerator::new(GeneratorConfig::seeded(42))?;
//! for event in generator.generate(10_000)? {
//!     core.submit(event)?;
//! }
//! ```

mod config;
mod generator;

pub use config::{GeneratorConfig, AMOUNT_RANGE, COUNTRY_CODES, CURRENCIES, STATUSES};
pub use generator::{EventGenerator, EventStream};
