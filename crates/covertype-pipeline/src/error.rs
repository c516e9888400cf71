//! Error types for covertype-pipeline

use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum Error {
    /// The data API refused a group for a reason other than exhaustion
    #[error("failed to collect group {group}: HTTP {status}: {body}")]
    Collect {
        group: usize,
        status: u16,
        body: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed table file
    #[error("table error: {0}")]
    Table(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Registry error
    #[error("registry error: {0}")]
    Registry(#[from] covertype_registry::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
