//! RON configuration for the retraining pipeline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Base URL of the batch data API
    #[serde(default = "default_data_api_url")]
    pub data_api_url: String,
    /// Base URL of the inference API
    #[serde(default = "default_inference_url")]
    pub inference_url: String,
    /// Directory holding the raw and preprocessed tables
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,
    /// Model registry directory
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,
    /// Name the best model is registered under
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Seed for the train/test split
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seconds between runs; run once when absent
    #[serde(default)]
    pub schedule_interval_secs: Option<u64>,
    /// Timeout for each HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_data_api_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_inference_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_tables_dir() -> PathBuf {
    PathBuf::from("/data/tables")
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from("/data/registry")
}

fn default_model_name() -> String {
    "CovertypeModel".to_string()
}

fn default_seed() -> u64 {
    42
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_api_url: default_data_api_url(),
            inference_url: default_inference_url(),
            tables_dir: default_tables_dir(),
            registry_dir: default_registry_dir(),
            model_name: default_model_name(),
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            schedule_interval_secs: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| Error::Config(e.to_string()))?;
        let config: PipelineConfig =
            ron::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(Error::Config(format!(
                "test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.schedule_interval_secs == Some(0) {
            return Err(Error::Config(
                "schedule_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
