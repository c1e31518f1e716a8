//! Layered error definitions
//!
//! Categorized by source: config / production / capacity / persistence

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Production Errors =====
    /// Invalid generation parameters
    #[error("production error: {message}")]
    Production { message: String },

    // ===== Capacity Errors =====
    /// Bounded queue is full
    #[error("queue full: capacity={capacity}, event {event_id} rejected")]
    Capacity { capacity: usize, event_id: u64 },

    // ===== Persistence Errors =====
    /// Bulk write failure
    #[error("store '{store}' persistence error: {message}")]
    Persistence { store: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create production error
    pub fn production(message: impl Into<String>) -> Self {
        Self::Production {
            message: message.into(),
        }
    }

    /// Create persistence error
    pub fn persistence(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether a per-batch retry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Io(_))
    }
}
