//! HTTP services for the covertype system
//!
//! - `data-api`: serves throttled random batches of the dataset to
//!   consumer groups (see [`data_api`])
//! - `inference-api`: serves predictions from the Production model and
//!   hot-swaps it on demand (see [`inference`])

pub mod config;
pub mod data_api;
pub mod http;
pub mod inference;

pub use config::{ConfigError, DataApiConfig, InferenceConfig};
pub use data_api::DataApiState;
pub use inference::{InferenceState, LoadedModel, ReloadError};

