//! Per-group distribution progress and its JSON persistence
//!
//! The persisted document maps string group numbers to a
//! `[last_update_time, batch_count]` pair:
//!
//! ```json
//! {"1": [0, -1], "2": [1718000000.5, 3], ...}
//! ```
//!
//! The whole document is rewritten after every state-changing request.

use crate::error::{Error, Result};
use crate::{GROUP_COUNT, MAX_BATCH_COUNT, MIN_UPDATE_SECS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Progress of a single group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, i64)", into = "(f64, i64)")]
pub struct LedgerEntry {
    /// Seconds since epoch of the last batch advance, 0 if never
    pub last_update_time: f64,
    /// Current batch number, -1 before the first batch
    pub batch_count: i64,
}

impl LedgerEntry {
    /// Entry for a group that has never been served
    pub const FRESH: LedgerEntry = LedgerEntry {
        last_update_time: 0.0,
        batch_count: -1,
    };

    /// Whether the group has received every batch
    pub fn is_exhausted(&self) -> bool {
        self.batch_count >= MAX_BATCH_COUNT
    }

    /// Whether enough time has passed at `now` to move to the next batch
    pub fn gate_open(&self, now: f64) -> bool {
        now - self.last_update_time > MIN_UPDATE_SECS
    }

    /// The entry after advancing at `now`
    ///
    /// The first advance jumps from -1 straight to batch 1.
    pub fn advanced(&self, now: f64) -> LedgerEntry {
        let step = if self.batch_count == -1 { 2 } else { 1 };
        LedgerEntry {
            last_update_time: now,
            batch_count: self.batch_count + step,
        }
    }
}

impl Default for LedgerEntry {
    fn default() -> Self {
        Self::FRESH
    }
}

impl From<(f64, i64)> for LedgerEntry {
    fn from((last_update_time, batch_count): (f64, i64)) -> Self {
        Self {
            last_update_time,
            batch_count,
        }
    }
}

impl From<LedgerEntry> for (f64, i64) {
    fn from(entry: LedgerEntry) -> Self {
        (entry.last_update_time, entry.batch_count)
    }
}

/// All group entries plus the file they are mirrored to
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl LedgerStore {
    /// Open the ledger at `path`, creating and writing a fresh one if absent
    ///
    /// An existing document is trusted as-is.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.is_file() {
            let content = fs::read_to_string(&path)?;
            let entries = parse_document(&content)?;
            info!(path = %path.display(), "loaded ledger");
            return Ok(Self { path, entries });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            path,
            entries: vec![LedgerEntry::FRESH; GROUP_COUNT],
        };
        store.persist()?;
        info!(path = %store.path.display(), "initialized ledger");
        Ok(store)
    }

    /// Location of the persisted document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry for `group` in `1..=GROUP_COUNT`
    pub fn entry(&self, group: usize) -> LedgerEntry {
        self.entries[group - 1]
    }

    /// All entries, index 0 is group 1
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Replace a group's entry and persist the whole ledger
    ///
    /// On a failed write the previous entry is restored so the in-memory
    /// ledger keeps matching the file.
    pub fn update(&mut self, group: usize, entry: LedgerEntry) -> Result<()> {
        let previous = std::mem::replace(&mut self.entries[group - 1], entry);
        if let Err(err) = self.persist() {
            self.entries[group - 1] = previous;
            warn!(group, error = %err, "ledger write failed, entry rolled back");
            return Err(err);
        }
        Ok(())
    }

    /// Write the full ledger to disk, replacing the previous document
    pub fn persist(&self) -> Result<()> {
        let document = self.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, document)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))
    }

    /// Serialize the ledger document
    pub fn to_json(&self) -> Result<String> {
        let document: IndexMap<String, LedgerEntry> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ((i + 1).to_string(), *entry))
            .collect();
        serde_json::to_string(&document).map_err(|e| Error::Persistence(e.to_string()))
    }
}

fn parse_document(content: &str) -> Result<Vec<LedgerEntry>> {
    let mut document: IndexMap<String, LedgerEntry> =
        serde_json::from_str(content).map_err(|e| Error::Ledger(e.to_string()))?;

    let entries = (1..=GROUP_COUNT)
        .map(|group| {
            document
                .shift_remove(&group.to_string())
                .ok_or_else(|| Error::Ledger(format!("missing group {}", group)))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(key) = document.keys().next() {
        return Err(Error::Ledger(format!("unexpected group key {:?}", key)));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fresh_ledger_is_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        let store = LedgerStore::open(&path).unwrap();

        assert!(path.is_file());
        assert!(store.entries().iter().all(|e| *e == LedgerEntry::FRESH));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["1"], serde_json::json!([0.0, -1]));
        assert_eq!(raw.as_object().unwrap().len(), GROUP_COUNT);
    }

    #[test]
    fn test_creates_missing_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("timestamps.json");
        LedgerStore::open(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_existing_document_is_trusted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        let doc = r#"{"1": [0, -1], "2": [0, -1], "3": [1700000000.25, 4], "4": [0, -1],
            "5": [0, -1], "6": [0, -1], "7": [0, -1], "8": [0, -1], "9": [0, -1], "10": [12, 10]}"#;
        fs::write(&path, doc).unwrap();

        let store = LedgerStore::open(&path).unwrap();
        assert_eq!(
            store.entry(3),
            LedgerEntry {
                last_update_time: 1_700_000_000.25,
                batch_count: 4
            }
        );
        assert!(store.entry(10).is_exhausted());
        // Loading alone does not rewrite the file
        assert_eq!(fs::read_to_string(&path).unwrap(), doc);
    }

    #[test]
    fn test_rejects_incomplete_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        fs::write(&path, r#"{"1": [0, -1]}"#).unwrap();
        assert!(matches!(LedgerStore::open(&path), Err(Error::Ledger(_))));
    }

    #[test]
    fn test_rejects_unknown_group() {
        let mut doc: IndexMap<String, (f64, i64)> =
            (1..=GROUP_COUNT).map(|g| (g.to_string(), (0.0, -1))).collect();
        doc.insert("11".to_string(), (0.0, -1));
        let content = serde_json::to_string(&doc).unwrap();
        assert!(matches!(parse_document(&content), Err(Error::Ledger(_))));
    }

    #[test]
    fn test_update_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        let mut store = LedgerStore::open(&path).unwrap();
        let entry = LedgerEntry::FRESH.advanced(1_000.5);
        store.update(7, entry).unwrap();

        let reopened = LedgerStore::open(&path).unwrap();
        assert_eq!(reopened.entry(7), entry);
        assert_eq!(reopened.entry(6), LedgerEntry::FRESH);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamps.json");
        let mut store = LedgerStore::open(&path).unwrap();

        // Replacing the target with a directory makes the rename fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store.update(2, LedgerEntry::FRESH.advanced(500.0)).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(store.entry(2), LedgerEntry::FRESH);
    }

    #[test]
    fn test_entry_transitions() {
        let first = LedgerEntry::FRESH.advanced(400.0);
        assert_eq!(first.batch_count, 1);
        assert_eq!(first.last_update_time, 400.0);

        let second = first.advanced(800.0);
        assert_eq!(second.batch_count, 2);

        assert!(LedgerEntry::FRESH.gate_open(300.5));
        assert!(!LedgerEntry::FRESH.gate_open(300.0));
        assert!(!first.gate_open(700.0));
        assert!(first.gate_open(700.01));
    }
}
