//! RON configuration for the HTTP services

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Batch data API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataApiConfig {
    /// Listen address
    #[serde(default = "default_data_api_listen")]
    pub listen: String,
    /// CSV file with a header line
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    /// JSON ledger of per-group progress
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Sampling seed; seeded from the clock when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_data_api_listen() -> String {
    "0.0.0.0:8001".to_string()
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("/data/covertype.csv")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("/data/timestamps.json")
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            listen: default_data_api_listen(),
            dataset_path: default_dataset_path(),
            ledger_path: default_ledger_path(),
            seed: None,
        }
    }
}

/// Inference API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Listen address
    #[serde(default = "default_inference_listen")]
    pub listen: String,
    /// Model registry directory
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,
    /// Registered model name
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_inference_listen() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from("/data/registry")
}

fn default_model_name() -> String {
    "CovertypeModel".to_string()
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            listen: default_inference_listen(),
            registry_dir: default_registry_dir(),
            model_name: default_model_name(),
        }
    }
}

impl DataApiConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_ron(path.as_ref())
    }
}

impl InferenceConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_ron(path.as_ref())
    }
}

/// Load `path` when it exists, otherwise fall back to defaults
pub fn load_or_default<T: DeserializeOwned + Default>(
    path: impl AsRef<Path>,
) -> Result<T, ConfigError> {
    let path = path.as_ref();
    if path.is_file() {
        load_ron(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(T::default())
    }
}

fn load_ron<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    ron::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}
