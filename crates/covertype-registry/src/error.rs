//! Error types for covertype-registry

use thiserror::Error;

/// Registry error type
#[derive(Debug, Error)]
pub enum Error {
    /// Run not found
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Model name not registered
    #[error("registered model not found: {0}")]
    ModelNotFound(String),

    /// Version not registered under the model name
    #[error("version {version} of model {name} not found")]
    VersionNotFound { name: String, version: u32 },

    /// Nothing promoted to Production yet
    #[error("model {0} has no Production version")]
    NoProductionVersion(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;
