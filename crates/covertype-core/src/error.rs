//! Error types for covertype-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid group number: {0}")]
    InvalidGroup(i64),

    #[error("group {0} has already received every batch")]
    AlreadyExhausted(usize),

    #[error("partition {group} holds {available} rows, {required} required")]
    InsufficientData {
        group: usize,
        available: usize,
        required: usize,
    },

    #[error("failed to persist ledger: {0}")]
    Persistence(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Message shown to API consumers
    pub fn detail(&self) -> String {
        match self {
            Error::InvalidGroup(_) => "Número de grupo inválido".to_string(),
            Error::AlreadyExhausted(_) => {
                "Ya se recolectó toda la información mínima necesaria".to_string()
            }
            Error::InsufficientData { group, .. } => {
                format!("No hay suficientes datos en el batch {}.", group)
            }
            other => other.to_string(),
        }
    }

    /// Whether the caller can do anything about this error
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidGroup(_) | Error::AlreadyExhausted(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
