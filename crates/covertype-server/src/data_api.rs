//! Routes of the batch data API
//!
//! | Route | Success | Errors |
//! |---|---|---|
//! | `GET /` | service info | |
//! | `GET /data?group_number=N` | `{group_number, batch_number, data}` | 400 invalid group / exhausted, 422 bad query, 500 |
//! | `GET /restart_data_generation?group_number=N` | `{ok: true}` | 400 invalid group, 422 bad query, 500 |

use crate::http::{error_response, json_response, normalize_path, query_param, HttpResponse};
use covertype_core::{Distributor, Error};
use hyper::{Method, StatusCode, Uri};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state of the data API
pub struct DataApiState {
    pub distributor: Arc<Distributor>,
}

impl DataApiState {
    pub fn new(distributor: Distributor) -> Self {
        Self {
            distributor: Arc::new(distributor),
        }
    }

    /// Run a distributor call on the blocking pool
    ///
    /// Every call takes the ledger lock and writes the ledger file.
    async fn blocking<T, F>(&self, call: F) -> Result<T, Error>
    where
        F: FnOnce(&Distributor) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let distributor = self.distributor.clone();
        tokio::task::spawn_blocking(move || call(&distributor))
            .await
            .unwrap_or_else(|e| Err(Error::Persistence(format!("ledger task failed: {}", e))))
    }
}

/// Dispatch a request to its handler
pub async fn route(state: &DataApiState, method: &Method, uri: &Uri) -> HttpResponse {
    let path = normalize_path(uri.path());
    if !matches!(path, "/" | "/data" | "/restart_data_generation") {
        return error_response(StatusCode::NOT_FOUND, "Not Found");
    }
    if *method != Method::GET {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }

    match path {
        "/" => root(),
        "/data" => read_data(state, uri.query()).await,
        _ => restart_data(state, uri.query()).await,
    }
}

fn root() -> HttpResponse {
    json_response(
        StatusCode::OK,
        &json!({ "Proyecto 2": "Extracción de datos, entrenamiento de modelos." }),
    )
}

async fn read_data(state: &DataApiState, query: Option<&str>) -> HttpResponse {
    let group_number = match parse_group(query) {
        Ok(g) => g,
        Err(response) => return response,
    };

    match state.blocking(move |d| d.get_batch(group_number)).await {
        Ok(batch) => json_response(StatusCode::OK, &batch),
        Err(err) => core_error(err),
    }
}

async fn restart_data(state: &DataApiState, query: Option<&str>) -> HttpResponse {
    let group_number = match parse_group(query) {
        Ok(g) => g,
        Err(response) => return response,
    };

    match state.blocking(move |d| d.reset_group(group_number)).await {
        Ok(()) => json_response(StatusCode::OK, &json!({ "ok": true })),
        Err(err) => core_error(err),
    }
}

fn parse_group(query: Option<&str>) -> Result<i64, HttpResponse> {
    let raw = query_param(query, "group_number").ok_or_else(|| {
        error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "query parameter group_number is required",
        )
    })?;
    raw.trim().parse().map_err(|_| {
        error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "query parameter group_number must be an integer",
        )
    })
}

fn core_error(err: Error) -> HttpResponse {
    if err.is_client_error() {
        info!(error = %err, "request refused");
        return error_response(StatusCode::BAD_REQUEST, err.detail());
    }
    error!(error = %err, "request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.detail())
}
