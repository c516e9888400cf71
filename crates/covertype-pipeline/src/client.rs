//! HTTP clients for the batch data API and the inference API

use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Detail prefix the data API uses once a group is exhausted
const EXHAUSTED_MARKER: &str = "Ya se recolectó";

/// Outcome of fetching one group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupFetch {
    /// Rows sampled from the group's current batch
    Batch { batch_number: i64, rows: Vec<Vec<String>> },
    /// The group has handed out all of its batches
    Exhausted,
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    batch_number: i64,
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct DetailBody {
    detail: String,
}

/// Client for the pipeline's two HTTP collaborators
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    data_api_url: String,
    inference_url: String,
}

impl ApiClient {
    /// Create a client with a per-request timeout
    pub fn new(data_api_url: &str, inference_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            data_api_url: data_api_url.trim_end_matches('/').to_string(),
            inference_url: inference_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch a sample of one group's current batch
    pub async fn fetch_group(&self, group: usize) -> Result<GroupFetch> {
        let url = format!("{}/data", self.data_api_url);
        let response = self
            .http
            .get(&url)
            .query(&[("group_number", group)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::OK {
            let parsed: BatchBody = serde_json::from_str(&body).map_err(|e| Error::Collect {
                group,
                status: status.as_u16(),
                body: format!("unreadable batch: {}", e),
            })?;
            let rows = parsed
                .data
                .into_iter()
                .map(|row| row.into_iter().map(field_to_string).collect())
                .collect::<Vec<Vec<String>>>();
            debug!(group, batch = parsed.batch_number, rows = rows.len(), "fetched batch");
            return Ok(GroupFetch::Batch {
                batch_number: parsed.batch_number,
                rows,
            });
        }

        if status == StatusCode::BAD_REQUEST {
            if let Ok(detail) = serde_json::from_str::<DetailBody>(&body) {
                if detail.detail.contains(EXHAUSTED_MARKER) {
                    return Ok(GroupFetch::Exhausted);
                }
            }
        }

        Err(Error::Collect {
            group,
            status: status.as_u16(),
            body,
        })
    }

    /// Ask the inference API to reload its Production model
    ///
    /// Failures are logged and reported as `false`.
    pub async fn notify_reload(&self) -> bool {
        let url = format!("{}/reload_models/", self.inference_url);
        match self.http.post(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("inference API reloaded its model");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), body = %body, "inference API reload failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "could not reach inference API");
                false
            }
        }
    }
}

fn field_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
