//! logrotor State - persisted last-rotation table
//!
//! The table is loaded once at startup, mutated in memory while files are
//! rotated, and written back atomically at the end of the run. Records for
//! paths that no group selects any more are kept as they are.

pub mod atomic;
pub mod record;

use chrono::{DateTime, Utc};
use logrotor_core::{constants, Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use record::StateRecord;

/// Permission bits for a freshly written state file
const STATE_FILE_MODE: u32 = 0o644;

/// In-memory view of the state table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStore {
    records: BTreeMap<PathBuf, StateRecord>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from disk. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("State file {} not found, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::state(format!("Cannot read {}: {}", path.display(), e)))?;
        let store = Self::parse(&content);
        info!(
            "Loaded {} state record(s) from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse table content, skipping lines that cannot be understood
    pub fn parse(content: &str) -> Self {
        let mut records = BTreeMap::new();
        for (number, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || is_header(trimmed) {
                continue;
            }
            match StateRecord::parse_line(trimmed) {
                Ok(record) => {
                    records.insert(record.path.clone(), record);
                }
                Err(e) => warn!("Skipping state line {}: {}", number + 1, e),
            }
        }
        Self { records }
    }

    /// Render the full table as it is written to disk
    pub fn render(&self) -> String {
        let mut out = String::from(constants::STATE_HEADER);
        out.push('\n');
        for record in self.records.values() {
            out.push_str(&record.to_line());
            out.push('\n');
        }
        out
    }

    /// Write the table back atomically.
    /// Failure is surfaced as `StatePersist`, which fails the whole run.
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic::atomic_write(path, &self.render(), STATE_FILE_MODE).map_err(|e| {
            Error::state(format!("Cannot write {}: {}", path.display(), e))
        })?;
        debug!("Saved {} state record(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Look up the record for a path
    pub fn get(&self, path: &Path) -> Option<&StateRecord> {
        self.records.get(path)
    }

    /// Note a completed rotation of `path` at `at`.
    ///
    /// The stored timestamp never moves backwards and the count always grows.
    pub fn record_rotation(&mut self, path: &Path, at: DateTime<Utc>) -> &StateRecord {
        let record = self
            .records
            .entry(path.to_path_buf())
            .or_insert_with(|| StateRecord::new(path.to_path_buf(), at, 0));
        if at > record.last_rotated {
            record.last_rotated = at;
        }
        record.rotations += 1;
        record
    }

    /// Insert or replace a record as-is
    pub fn insert(&mut self, record: StateRecord) {
        self.records.insert(record.path.clone(), record);
    }

    /// All records ordered by path
    pub fn records(&self) -> impl Iterator<Item = &StateRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_header(line: &str) -> bool {
    line == constants::STATE_HEADER || line.starts_with("logrotate state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(&dir.path().join("absent.status")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logrotor.status");

        let mut store = StateStore::new();
        store.record_rotation(Path::new("/var/log/b.log"), at(2));
        store.record_rotation(Path::new("/var/log/a.log"), at(1));
        store.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(constants::STATE_HEADER));
        assert!(lines.next().unwrap().starts_with("\"/var/log/a.log\""));

        let loaded = StateStore::load(&path).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_record_rotation_is_monotonic() {
        let mut store = StateStore::new();
        let path = Path::new("/var/log/app.log");

        store.record_rotation(path, at(10));
        let record = store.record_rotation(path, at(10) - Duration::days(3));

        assert_eq!(record.last_rotated, at(10));
        assert_eq!(record.rotations, 2);
    }

    #[test]
    fn test_parse_skips_garbage_and_keeps_unknown_paths() {
        let content = format!(
            "{}\n\"/var/log/a.log\" 2026-05-01T12:00:00Z 4\nthis is not a record\n\n\"/gone/b.log\" 2025-01-01T00:00:00Z 9\n",
            constants::STATE_HEADER
        );
        let store = StateStore::parse(&content);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(Path::new("/var/log/a.log")).unwrap().rotations, 4);
        assert_eq!(store.get(Path::new("/gone/b.log")).unwrap().rotations, 9);
    }

    #[test]
    fn test_reads_logrotate_tables() {
        let content = "logrotate state -- version 2\n\"/var/log/syslog\" 2024-3-1-0:0:0\n";
        let store = StateStore::parse(content);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(Path::new("/var/log/syslog")).unwrap().rotations, 0);
    }

    #[test]
    fn test_save_failure_is_state_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        // Parent "directory" is a regular file
        let result = StateStore::new().save(&blocker.join("logrotor.status"));
        assert!(matches!(result, Err(Error::StatePersist(_))));
    }
}
