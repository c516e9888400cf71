//! Cleaning and standardization of collected rows

use crate::error::{Error, Result};
use crate::table::Table;
use covertype_registry::{Scaler, FEATURE_COLUMNS, FEATURE_COUNT};
use tracing::info;

/// Label column
pub const LABEL_COLUMN: &str = "Cover_Type";

/// Categorical columns dropped before training
pub const CATEGORICAL_COLUMNS: [&str; 2] = ["Wilderness_Area", "Soil_Type"];

/// Columns of the raw table, in the order the data API serves them
pub const RAW_COLUMNS: [&str; 13] = [
    "Elevation",
    "Aspect",
    "Slope",
    "Horizontal_Distance_To_Hydrology",
    "Vertical_Distance_To_Hydrology",
    "Horizontal_Distance_To_Roadways",
    "Hillshade_9am",
    "Hillshade_Noon",
    "Hillshade_3pm",
    "Horizontal_Distance_To_Fire_Points",
    "Wilderness_Area",
    "Soil_Type",
    "Cover_Type",
];

/// Header of the preprocessed table
pub fn preprocessed_header() -> Vec<&'static str> {
    FEATURE_COLUMNS
        .iter()
        .copied()
        .chain(std::iter::once(LABEL_COLUMN))
        .collect()
}

/// Numeric features and labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledRows {
    pub features: Vec<[f64; FEATURE_COUNT]>,
    pub labels: Vec<i64>,
}

impl LabeledRows {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Result of preprocessing a raw table
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Standardized features plus label, ready to store
    pub table: Table,
    /// Scaler fitted on the surviving rows; `None` when no row survived
    pub scaler: Option<Scaler>,
    /// Rows dropped as incomplete or unparseable
    pub dropped: usize,
}

/// Extract numeric features and labels, skipping incomplete rows
///
/// Returns the rows that parsed and the number that did not.
pub fn labeled_rows(table: &Table) -> Result<(LabeledRows, usize)> {
    let feature_idx = FEATURE_COLUMNS
        .iter()
        .map(|name| column(table, name))
        .collect::<Result<Vec<_>>>()?;
    let label_idx = column(table, LABEL_COLUMN)?;
    let categorical_idx = CATEGORICAL_COLUMNS
        .iter()
        .filter_map(|name| table.column(name))
        .collect::<Vec<_>>();

    let mut out = LabeledRows::default();
    let mut dropped = 0;
    for row in &table.rows {
        match parse_row(row, &feature_idx, label_idx, &categorical_idx) {
            Some((features, label)) => {
                out.features.push(features);
                out.labels.push(label);
            }
            None => dropped += 1,
        }
    }
    Ok((out, dropped))
}

/// Drop incomplete rows and categoricals, then standardize the features
pub fn preprocess(raw: &Table) -> Result<Preprocessed> {
    let (rows, dropped) = labeled_rows(raw)?;
    let header = preprocessed_header();

    if rows.is_empty() {
        info!(dropped, "no rows survived preprocessing");
        return Ok(Preprocessed {
            table: Table::new(&header, Vec::new()),
            scaler: None,
            dropped,
        });
    }

    let scaler = Scaler::fit(&rows.features);
    let out_rows = rows
        .features
        .iter()
        .zip(&rows.labels)
        .map(|(features, label)| {
            scaler
                .transform(features)
                .iter()
                .map(|v| v.to_string())
                .chain(std::iter::once(label.to_string()))
                .collect()
        })
        .collect();

    info!(rows = rows.len(), dropped, "preprocessed rows");
    Ok(Preprocessed {
        table: Table::new(&header, out_rows),
        scaler: Some(scaler),
        dropped,
    })
}

fn column(table: &Table, name: &str) -> Result<usize> {
    table
        .column(name)
        .ok_or_else(|| Error::Table(format!("missing column {}", name)))
}

fn parse_row(
    row: &[String],
    feature_idx: &[usize],
    label_idx: usize,
    categorical_idx: &[usize],
) -> Option<([f64; FEATURE_COUNT], i64)> {
    if categorical_idx
        .iter()
        .any(|&i| row.get(i).map_or(true, |v| v.trim().is_empty()))
    {
        return None;
    }

    let mut features = [0.0; FEATURE_COUNT];
    for (slot, &i) in features.iter_mut().zip(feature_idx) {
        let value: f64 = row.get(i)?.trim().parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        *slot = value;
    }
    let label = row.get(label_idx)?.trim().parse().ok()?;
    Some((features, label))
}
