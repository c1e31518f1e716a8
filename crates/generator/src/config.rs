//! Generator configuration and vocabularies

use contracts::{ContractError, SimulationConfig};

/// Currencies drawn into `metadata.currency`
pub const CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "INR", "CAD", "AUD", "CHF", "HKD", "MXN", "SGD",
];

/// Statuses drawn into `metadata.status`
pub const STATUSES: &[&str] = &[
    "PENDING",
    "COMPLETED",
    "FAILED",
    "CANCELLED",
    "REFUNDED",
    "AUTHORIZED",
    "SETTLED",
];

/// Countries drawn into `metadata.country_code`
pub const COUNTRY_CODES: &[&str] = &[
    "US", "GB", "DE", "FR", "IT", "ES", "NL", "CH", "SE", "PL", "CZ", "RS",
];

/// Absolute amount range before the debit sign is applied
pub const AMOUNT_RANGE: (f64, f64) = (10.0, 1_000_000.0);

/// Event generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Fixed seed for reproducible streams
    pub seed: Option<u64>,

    /// Number of distinct simulated accounts, ids are `1..=account_pool`
    pub account_pool: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            account_pool: 10_000,
        }
    }
}

impl GeneratorConfig {
    /// Fixed-seed configuration (tests, reproducible comparisons)
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ContractError> {
        if self.account_pool == 0 {
            return Err(ContractError::production("account_pool must be > 0"));
        }
        Ok(())
    }
}

impl From<&SimulationConfig> for GeneratorConfig {
    fn from(sim: &SimulationConfig) -> Self {
        Self {
            seed: sim.seed,
            account_pool: sim.account_pool,
        }
    }
}
