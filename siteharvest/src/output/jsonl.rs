//! JSON lines output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{ensure_parent_dir, RecordSink};
use crate::errors::SinkError;
use crate::extract::Record;

/// Writes one JSON object per record, keys in `columns` order.
pub fn write_json_lines<W: Write>(
    w: &mut W,
    columns: &[String],
    records: &[Record],
) -> Result<(), SinkError> {
    for record in records {
        let row: Record = columns
            .iter()
            .map(|column| (column.as_str(), record.get(column).map(ToString::to_string)))
            .collect();
        serde_json::to_writer(&mut *w, &row)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Writes the table to a JSON lines file, replacing any previous content.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    /// Creates a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, columns: &[String], records: &[Record]) -> Result<(), SinkError> {
        ensure_parent_dir(&self.path)?;
        let mut writer = BufWriter::new(File::create(&self.path)?);
        write_json_lines(&mut writer, columns, records)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_object_per_line_in_column_order() {
        let records: Vec<Record> = vec![
            [("b", Some("2".to_string())), ("a", Some("1".to_string()))]
                .into_iter()
                .collect(),
            [("a", None)].into_iter().collect(),
        ];
        let columns = vec!["a".to_string(), "b".to_string()];

        let mut out = Vec::new();
        write_json_lines(&mut out, &columns, &records).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"a\":\"1\",\"b\":\"2\"}\n{\"a\":null,\"b\":null}\n"
        );
    }

    #[test]
    fn test_empty_table_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        JsonLinesSink::new(&path).write(&["a".to_string()], &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
