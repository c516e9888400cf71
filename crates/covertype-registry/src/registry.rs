//! Directory-backed run tracking and model registry
//!
//! Layout under the registry root:
//!
//! ```text
//! runs/<run_id>.json     one tracked training run with its artifact
//! models/<name>.json     registered versions of a model and their stages
//! ```
//!
//! Documents are replaced atomically (write to a temp file, then rename).

use crate::error::{Error, Result};
use crate::model::ModelArtifact;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Disambiguates runs logged within the same microsecond
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Lifecycle stage of a model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Stage {
    /// Registered but not promoted
    #[default]
    None,
    /// Currently served
    Production,
    /// Previously served
    Archived,
}

/// A tracked training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    pub params: IndexMap<String, String>,
    pub metrics: IndexMap<String, f64>,
    pub artifact: ModelArtifact,
    pub created_at: DateTime<Utc>,
}

/// One registered version of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: u32,
    pub run_id: String,
    pub stage: Stage,
    pub registered_at: DateTime<Utc>,
}

/// All versions registered under a name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub versions: Vec<ModelVersion>,
}

impl RegisteredModel {
    /// The version currently in Production, if any
    pub fn production(&self) -> Option<&ModelVersion> {
        self.versions.iter().find(|v| v.stage == Stage::Production)
    }
}

/// Read access to the Production slot
pub trait ModelRegistry: Send + Sync {
    /// Load the artifact of the Production version of `name`
    fn load_production(&self, name: &str) -> Result<(ModelVersion, ModelArtifact)>;
}

/// Registry stored as JSON documents in a directory
#[derive(Debug, Clone)]
pub struct FsRegistry {
    root: PathBuf,
}

impl FsRegistry {
    /// Use `root` as the registry directory; it is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Registry directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record a training run and its artifact, returning the run id
    pub fn log_run(
        &self,
        run_name: &str,
        params: IndexMap<String, String>,
        metrics: IndexMap<String, f64>,
        artifact: ModelArtifact,
    ) -> Result<String> {
        let created_at = Utc::now();
        let run_id = format!(
            "{}-{:04}-{}",
            created_at.format("%Y%m%dT%H%M%S%6f"),
            RUN_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000,
            run_name
        );
        let record = RunRecord {
            run_id: run_id.clone(),
            run_name: run_name.to_string(),
            params,
            metrics,
            artifact,
            created_at,
        };
        write_json(&self.run_path(&run_id), &record)?;
        info!(run_id = %run_id, "logged run");
        Ok(run_id)
    }

    /// Load a tracked run
    pub fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        let path = self.run_path(run_id);
        if !path.is_file() {
            return Err(Error::RunNotFound(run_id.to_string()));
        }
        read_json(&path)
    }

    /// Register a run's artifact as the next version of `name`
    pub fn register_model(&self, name: &str, run_id: &str) -> Result<ModelVersion> {
        self.load_run(run_id)?;

        let mut model = self.model(name).or_else(|err| match err {
            Error::ModelNotFound(_) => Ok(RegisteredModel {
                name: name.to_string(),
                versions: Vec::new(),
            }),
            other => Err(other),
        })?;

        let version = ModelVersion {
            version: model.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1,
            run_id: run_id.to_string(),
            stage: Stage::None,
            registered_at: Utc::now(),
        };
        model.versions.push(version.clone());
        write_json(&self.model_path(name), &model)?;
        info!(model = name, version = version.version, "registered model version");
        Ok(version)
    }

    /// Promote a version to Production, archiving any previous Production version
    pub fn transition_to_production(&self, name: &str, version: u32) -> Result<()> {
        let mut model = self.model(name)?;
        if !model.versions.iter().any(|v| v.version == version) {
            return Err(Error::VersionNotFound {
                name: name.to_string(),
                version,
            });
        }

        for v in &mut model.versions {
            if v.version == version {
                v.stage = Stage::Production;
            } else if v.stage == Stage::Production {
                v.stage = Stage::Archived;
            }
        }
        write_json(&self.model_path(name), &model)?;
        info!(model = name, version, "promoted to Production");
        Ok(())
    }

    /// All versions registered under `name`
    pub fn model(&self, name: &str) -> Result<RegisteredModel> {
        let path = self.model_path(name);
        if !path.is_file() {
            return Err(Error::ModelNotFound(name.to_string()));
        }
        read_json(&path)
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(format!("{}.json", run_id))
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.root.join("models").join(format!("{}.json", name))
    }
}

impl ModelRegistry for FsRegistry {
    fn load_production(&self, name: &str) -> Result<(ModelVersion, ModelArtifact)> {
        let model = self.model(name)?;
        let version = model
            .production()
            .cloned()
            .ok_or_else(|| Error::NoProductionVersion(name.to_string()))?;
        let run = self.load_run(&version.run_id)?;
        Ok((version, run.artifact))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| Error::Serialization(e.to_string()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content =
        serde_json::to_string_pretty(value).map_err(|e| Error::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
