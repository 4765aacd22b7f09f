//! Core error taxonomy.

use thiserror::Error;

/// Result type of the simulation core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the simulation core.
///
/// Neither kind is retried: configuration errors are raised before any
/// simulated day runs, and computation errors abort the run immediately.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, malformed or out-of-domain configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal consistency failure during a probability computation.
    #[error("model computation error: {0}")]
    ModelComputation(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::ModelComputation(msg.into())
    }
}
