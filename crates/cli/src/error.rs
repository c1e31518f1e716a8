//! Error types for CLI operations.

use contracts::DispatchMode;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A mode pass did not complete
    #[error("{count} of {total} mode(s) did not complete: {modes}")]
    ModesFailed {
        count: usize,
        total: usize,
        modes: String,
    },

    /// Benchmark thread died or could not be joined
    #[error("Benchmark execution failed: {message}")]
    Execution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn modes_failed(failed: &[DispatchMode], total: usize) -> Self {
        Self::ModesFailed {
            count: failed.len(),
            total,
            modes: failed
                .iter()
                .map(DispatchMode::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}
