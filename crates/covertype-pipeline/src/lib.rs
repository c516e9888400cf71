//! Covertype Pipeline - Retraining workflow
//!
//! One run executes, in order:
//! 1. Clear the raw and preprocessed tables
//! 2. Collect one batch per group from the data API
//! 3. Preprocess: drop incomplete rows and categoricals, standardize
//! 4. Train candidate models, promote the most accurate to Production
//! 5. Ask the inference API to reload its model

pub mod client;
pub mod config;
mod error;
pub mod preprocess;
pub mod table;
pub mod train;
mod workflow;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use workflow::{Pipeline, RunSummary};

