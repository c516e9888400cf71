//! Inference API server
//!
//! Usage: `inference-api [config.ron]` (default `config/inference_api.ron`).

use covertype_core::init_logging;
use covertype_registry::FsRegistry;
use covertype_server::config::load_or_default;
use covertype_server::{http, inference, InferenceConfig, InferenceState};
use http_body_util::BodyExt;
use hyper::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("covertype_server=info,covertype_registry=info,warn");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/inference_api.ron".to_string());
    let config: InferenceConfig = load_or_default(&config_path)?;

    let registry = FsRegistry::new(&config.registry_dir);
    let state = Arc::new(InferenceState::new(Arc::new(registry), config.model_name));

    // Serving starts even without a Production model; /reload_models/ can load it later
    if let Err(e) = state.reload().await {
        warn!(error = %e, uri = %state.model_uri(), "no model loaded at startup");
    }

    let addr: SocketAddr = config.listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    http::serve(listener, move |req| {
        let state = state.clone();
        async move {
            let (parts, body) = req.into_parts();
            match body.collect().await {
                Ok(collected) => {
                    inference::route(
                        &state,
                        &parts.method,
                        parts.uri.path(),
                        collected.to_bytes(),
                    )
                    .await
                }
                Err(e) => http::error_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed to read request body: {}", e),
                ),
            }
        }
    })
    .await;

    Ok(())
}
