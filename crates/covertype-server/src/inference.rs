//! Inference API with atomic hot-swap of the Production model
//!
//! The loaded model lives behind `RwLock<Option<Arc<LoadedModel>>>`.
//! A reload builds the replacement completely before swapping the
//! pointer; predictions already holding the old `Arc` finish on it.

use crate::http::{error_response, json_response, normalize_path, HttpResponse};
use covertype_registry::{Features, ModelArtifact, ModelRegistry};
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Why a reload left the current model in place
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Registry(#[from] covertype_registry::Error),

    /// The blocking registry read panicked or was cancelled
    #[error("registry task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Model currently held in memory
#[derive(Debug)]
pub struct LoadedModel {
    pub name: String,
    pub version: u32,
    pub artifact: ModelArtifact,
}

/// Shared state of the inference API
pub struct InferenceState {
    registry: Arc<dyn ModelRegistry>,
    model_name: String,
    current: RwLock<Option<Arc<LoadedModel>>>,
}

impl InferenceState {
    /// Create the state with no model loaded
    pub fn new(registry: Arc<dyn ModelRegistry>, model_name: impl Into<String>) -> Self {
        Self {
            registry,
            model_name: model_name.into(),
            current: RwLock::new(None),
        }
    }

    /// Registered model name served by this instance
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Registry URI of the Production slot
    pub fn model_uri(&self) -> String {
        format!("models:/{}/Production", self.model_name)
    }

    /// Load the Production artifact and swap it in
    ///
    /// On failure the previously loaded model stays in place.
    pub async fn reload(&self) -> Result<Arc<LoadedModel>, ReloadError> {
        let registry = self.registry.clone();
        let name = self.model_name.clone();
        let (version, artifact) =
            tokio::task::spawn_blocking(move || registry.load_production(&name)).await??;
        let loaded = Arc::new(LoadedModel {
            name: self.model_name.clone(),
            version: version.version,
            artifact,
        });
        *self.current.write().await = Some(loaded.clone());
        info!(
            model = %self.model_name,
            version = loaded.version,
            kind = loaded.artifact.kind(),
            "loaded Production model"
        );
        Ok(loaded)
    }

    /// The model currently served, if any
    pub async fn current(&self) -> Option<Arc<LoadedModel>> {
        self.current.read().await.clone()
    }
}

/// Dispatch a request to its handler
pub async fn route(
    state: &InferenceState,
    method: &Method,
    path: &str,
    body: Bytes,
) -> HttpResponse {
    match (method, normalize_path(path)) {
        (&Method::GET, "/") => json_response(
            StatusCode::OK,
            &json!({ "message": format!("API de predicción - {}", state.model_name()) }),
        ),
        (&Method::POST, "/reload_models") => reload_models(state).await,
        (&Method::POST, "/predict") => predict(state, &body).await,
        (_, "/" | "/reload_models" | "/predict") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn reload_models(state: &InferenceState) -> HttpResponse {
    let uri = state.model_uri();
    match state.reload().await {
        Ok(_) => json_response(
            StatusCode::OK,
            &json!({
                "message": format!("Modelo {} recargado desde {}", state.model_name(), uri)
            }),
        ),
        Err(err) => {
            error!(error = %err, "reload failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error al recargar: {}", err),
            )
        }
    }
}

async fn predict(state: &InferenceState, body: &[u8]) -> HttpResponse {
    let features: Features = match serde_json::from_slice(body) {
        Ok(features) => features,
        Err(err) => {
            warn!(error = %err, "malformed prediction request");
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string());
        }
    };

    let Some(model) = state.current().await else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "No hay modelo cargado en memoria. Llama /reload_models/ o reinicia la API.",
        );
    };

    let prediction = model.artifact.predict(&features.to_array());
    json_response(
        StatusCode::OK,
        &json!({ "model": model.name, "prediction": prediction }),
    )
}
