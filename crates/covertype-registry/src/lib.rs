//! Covertype Registry - Model artifacts and their lifecycle
//!
//! - [`ModelArtifact`]: A trained classifier that can predict a cover type
//! - [`FsRegistry`]: Directory-backed run tracking and model registry with
//!   a single Production slot per model name

mod error;
pub mod model;
mod registry;

pub use error::{Error, Result};
pub use model::{Features, ModelArtifact, Scaler, FEATURE_COLUMNS, FEATURE_COUNT};
pub use registry::{FsRegistry, ModelRegistry, ModelVersion, RegisteredModel, RunRecord, Stage};
