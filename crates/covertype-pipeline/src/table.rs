//! CSV-backed tables standing in for the relational store
//!
//! Each table is one `<name>.csv` file with a header line. Writes fully
//! replace the previous content.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw collected rows
pub const RAW_TABLE: &str = "covertype_raw";

/// Cleaned and standardized rows
pub const PREPROCESSED_TABLE: &str = "covertype_preprocessed";

/// In-memory table contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table from column names and rows
    pub fn new(header: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.header).map_err(csv_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_error)?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Table(e.to_string()))
    }

    fn from_csv(content: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content);
        let header = to_fields(reader.headers().map_err(csv_error)?);
        let rows = reader
            .records()
            .map(|row| row.map(|row| to_fields(&row)).map_err(csv_error))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { header, rows })
    }
}

fn to_fields(row: &csv::StringRecord) -> Vec<String> {
    row.iter().map(str::to_string).collect()
}

fn csv_error(err: csv::Error) -> Error {
    Error::Table(err.to_string())
}

/// Directory of CSV tables
#[derive(Debug, Clone)]
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    /// Use `dir` for table files; it is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Replace the contents of a table
    pub fn write(&self, name: &str, table: &Table) -> Result<()> {
        let content = table.to_csv()?;
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Read a table, `None` if it does not exist
    pub fn read(&self, name: &str) -> Result<Option<Table>> {
        let path = self.path(name);
        if !path.is_file() {
            return Ok(None);
        }
        Table::from_csv(&fs::read(path)?).map(Some)
    }

    /// Delete a table if it exists
    pub fn drop_table(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Table directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
