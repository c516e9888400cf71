//! Retraining pipeline runner
//!
//! Usage: `covertype-pipeline [config.ron]` (default `config/pipeline.ron`).
//! Runs once, or on a fixed interval when `schedule_interval_secs` is set.

use covertype_core::init_logging;
use covertype_pipeline::{Pipeline, PipelineConfig};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("covertype_pipeline=info,covertype_registry=info,warn");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/pipeline.ron".to_string());
    let config = if Path::new(&config_path).exists() {
        PipelineConfig::load(&config_path)?
    } else {
        warn!(path = %config_path, "config file not found, using defaults");
        PipelineConfig::default()
    };

    let interval = config.schedule_interval_secs;
    let pipeline = Pipeline::new(config)?;

    let Some(secs) = interval else {
        let summary = pipeline.run_once().await?;
        info!(?summary, "run complete");
        return Ok(());
    };

    info!(interval_secs = secs, "running on a schedule");
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match pipeline.run_once().await {
            Ok(summary) => info!(?summary, "run complete"),
            Err(e) => error!(error = %e, "run failed"),
        }
    }
}
