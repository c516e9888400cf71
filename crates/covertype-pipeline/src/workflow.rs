//! One retraining run: clear, collect, preprocess, train, notify

use crate::client::{ApiClient, GroupFetch};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::preprocess::{preprocess, RAW_COLUMNS};
use crate::table::{Table, TableStore, PREPROCESSED_TABLE, RAW_TABLE};
use crate::train::{TrainOutcome, Trainer};
use covertype_core::GROUP_COUNT;
use covertype_registry::FsRegistry;
use std::time::Duration;
use tracing::{info, warn};

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Groups that returned a batch
    pub groups_collected: usize,
    /// Groups the data API reported as exhausted
    pub groups_exhausted: usize,
    pub raw_rows: usize,
    pub preprocessed_rows: usize,
    /// `None` when training was skipped
    pub training: Option<TrainOutcome>,
    /// Whether the inference API acknowledged the reload
    pub notified: bool,
}

/// The retraining workflow and its collaborators
pub struct Pipeline {
    config: PipelineConfig,
    client: ApiClient,
    tables: TableStore,
    registry: FsRegistry,
}

impl Pipeline {
    /// Build the pipeline from configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client = ApiClient::new(
            &config.data_api_url,
            &config.inference_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let tables = TableStore::new(&config.tables_dir);
        let registry = FsRegistry::new(&config.registry_dir);
        Ok(Self {
            config,
            client,
            tables,
            registry,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    pub fn registry(&self) -> &FsRegistry {
        &self.registry
    }

    /// Execute every step once; the first hard failure aborts the run
    pub async fn run_once(&self) -> Result<RunSummary> {
        info!("starting retraining run");
        self.clear_tables()?;

        let (raw, groups_collected, groups_exhausted) = self.collect().await?;
        let raw_rows = raw.rows.len();

        let prepared = preprocess(&raw)?;
        self.tables.write(PREPROCESSED_TABLE, &prepared.table)?;
        let preprocessed_rows = prepared.table.rows.len();

        let stored = self.tables.read(PREPROCESSED_TABLE)?;
        let trainer = Trainer {
            registry: &self.registry,
            model_name: &self.config.model_name,
            seed: self.config.seed,
            test_fraction: self.config.test_fraction,
        };
        let training = trainer.run(stored.as_ref(), prepared.scaler.as_ref())?;

        let notified = self.client.notify_reload().await;

        let summary = RunSummary {
            groups_collected,
            groups_exhausted,
            raw_rows,
            preprocessed_rows,
            training,
            notified,
        };
        info!(
            collected = summary.groups_collected,
            exhausted = summary.groups_exhausted,
            rows = summary.raw_rows,
            "retraining run finished"
        );
        Ok(summary)
    }

    fn clear_tables(&self) -> Result<()> {
        self.tables.drop_table(RAW_TABLE)?;
        self.tables.drop_table(PREPROCESSED_TABLE)?;
        info!(dir = %self.tables.dir().display(), "cleared tables");
        Ok(())
    }

    async fn collect(&self) -> Result<(Table, usize, usize)> {
        let mut rows = Vec::new();
        let mut collected = 0;
        let mut exhausted = 0;

        for group in 1..=GROUP_COUNT {
            match self.client.fetch_group(group).await? {
                GroupFetch::Batch { batch_number, rows: batch } => {
                    info!(
                        group,
                        batch = batch_number,
                        rows = batch.len(),
                        "collected group"
                    );
                    collected += 1;
                    let before = rows.len() + batch.len();
                    rows.extend(
                        batch
                            .into_iter()
                            .filter(|row| row.len() == RAW_COLUMNS.len()),
                    );
                    if rows.len() < before {
                        warn!(
                            group,
                            dropped = before - rows.len(),
                            "rows with wrong field count"
                        );
                    }
                }
                GroupFetch::Exhausted => {
                    warn!(group, "group already fully collected");
                    exhausted += 1;
                }
            }
        }

        let raw = Table::new(&RAW_COLUMNS, rows);
        self.tables.write(RAW_TABLE, &raw)?;
        info!(rows = raw.rows.len(), "wrote raw table");
        Ok((raw, collected, exhausted))
    }
}
