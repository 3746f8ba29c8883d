//! CSV output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{ensure_parent_dir, RecordSink};
use crate::errors::SinkError;
use crate::extract::Record;

const SEPARATOR: char = ',';

fn needs_quotes(cell: &str) -> bool {
    cell.contains(SEPARATOR) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
}

fn write_row<'a, W: Write>(w: &mut W, cells: impl IntoIterator<Item = &'a str>) -> io::Result<()> {
    for (index, cell) in cells.into_iter().enumerate() {
        if index > 0 {
            write!(w, "{SEPARATOR}")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    writeln!(w)
}

/// Writes a header row of `columns` and one row per record. Null values are
/// empty cells.
pub fn write_csv<W: Write>(w: &mut W, columns: &[String], records: &[Record]) -> io::Result<()> {
    write_row(w, columns.iter().map(String::as_str))?;
    for record in records {
        write_row(
            w,
            columns
                .iter()
                .map(|column| record.get(column).unwrap_or_default()),
        )?;
    }
    Ok(())
}

/// Writes the table to a CSV file, replacing any previous content.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
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

impl RecordSink for CsvSink {
    fn write(&mut self, columns: &[String], records: &[Record]) -> Result<(), SinkError> {
        ensure_parent_dir(&self.path)?;
        let mut writer = BufWriter::new(File::create(&self.path)?);
        write_csv(&mut writer, columns, records)?;
        writer.flush()?;
        Ok(())
    }
}
