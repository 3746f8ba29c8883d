//! Persisting the final table.
//!
//! A [`RecordSink`] receives the projected records once per run, together
//! with the column order they were projected onto.

mod csv;
mod jsonl;

use std::path::{Path, PathBuf};

use crate::errors::SinkError;
use crate::extract::Record;

pub use csv::{write_csv, CsvSink};
pub use jsonl::{write_json_lines, JsonLinesSink};

/// Destination of a run's projected records.
pub trait RecordSink: Send {
    /// Persists `records`, whose keys are exactly `columns` in order.
    fn write(&mut self, columns: &[String], records: &[Record]) -> Result<(), SinkError>;
}

/// Keeps the last written table in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    columns: Vec<String>,
    records: Vec<Record>,
    writes: usize,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns of the last write.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Records of the last write.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of writes received.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, columns: &[String], records: &[Record]) -> Result<(), SinkError> {
        self.columns = columns.to_vec();
        self.records = records.to_vec();
        self.writes += 1;
        Ok(())
    }
}

/// Picks a file sink by extension: `.jsonl` and `.ndjson` write JSON lines,
/// anything else writes CSV.
#[must_use]
pub fn sink_for_path(path: impl Into<PathBuf>) -> Box<dyn RecordSink> {
    let path = path.into();
    let json_lines = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"));
    if json_lines {
        Box::new(JsonLinesSink::new(path))
    } else {
        Box::new(CsvSink::new(path))
    }
}

/// Creates the parent directory of `path` if it does not exist.
fn ensure_parent_dir(path: &Path) -> Result<(), SinkError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (Vec<String>, Vec<Record>) {
        let columns = vec!["name".to_string(), "email".to_string()];
        let records = vec![[("name", Some("Acme".to_string())), ("email", None)]
            .into_iter()
            .collect()];
        (columns, records)
    }

    #[test]
    fn test_memory_sink_keeps_last_table() {
        let (columns, records) = table();
        let mut sink = MemorySink::new();
        sink.write(&columns, &records).unwrap();

        assert_eq!(sink.columns(), columns.as_slice());
        assert_eq!(sink.records(), records.as_slice());
        assert_eq!(sink.writes(), 1);
    }

    #[test]
    fn test_sink_for_path_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let (columns, records) = table();

        let jsonl = dir.path().join("out.jsonl");
        sink_for_path(&jsonl).write(&columns, &records).unwrap();
        assert_eq!(
            std::fs::read_to_string(&jsonl).unwrap(),
            "{\"name\":\"Acme\",\"email\":null}\n"
        );

        let csv = dir.path().join("out.csv");
        sink_for_path(&csv).write(&columns, &records).unwrap();
        assert_eq!(std::fs::read_to_string(&csv).unwrap(), "name,email\nAcme,\n");
    }

    #[test]
    fn test_file_sinks_create_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("out.ndjson");
        let (columns, records) = table();

        sink_for_path(&nested).write(&columns, &records).unwrap();
        assert!(nested.exists());
    }
}
