//! Source dataset loaded from a CSV file
//!
//! Records are kept as raw string fields and served exactly as read.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// A single dataset row, one string per CSV field
pub type Record = Vec<String>;

/// Ordered, immutable sequence of records
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    header: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset from records already in memory
    pub fn from_records(header: Vec<String>, records: Vec<Record>) -> Self {
        Self { header, records }
    }

    /// Load a dataset from a CSV file whose first line is a header
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Dataset(format!("{}: {}", path.display(), e)))?;
        Self::from_csv_str(&content)
    }

    /// Parse CSV text; the first line is the header and blank lines are skipped
    ///
    /// Quoted fields are unquoted, so a quoted comma stays inside its field.
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let header = to_record(reader.headers().map_err(csv_error)?);
        let records = reader
            .records()
            .map(|row| row.map(|row| to_record(&row)).map_err(csv_error))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { header, records })
    }

    /// Column names from the header line
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// All records in file order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn to_record(row: &csv::StringRecord) -> Record {
    row.iter().map(str::to_string).collect()
}

fn csv_error(err: csv::Error) -> Error {
    Error::Dataset(err.to_string())
}
