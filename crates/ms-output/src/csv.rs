//! CSV trajectory sink.

use std::io::Write;
use std::path::Path;

use crate::error::OutputResult;
use crate::row::TrajectoryRow;
use crate::writer::OutputWriter;

/// Serde-backed CSV writer over any `Write` target.
pub struct CsvWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl CsvWriter<std::fs::File> {
    /// Create (truncate) a CSV file at `path`.
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CsvWriter<W> {
    /// Wrap any `Write` target (tests pass a `Vec<u8>`).
    pub fn from_writer(w: W) -> Self {
        Self {
            inner: csv::Writer::from_writer(w),
        }
    }

    /// Consume and return the underlying writer (tests).
    pub fn into_inner(self) -> OutputResult<W> {
        self.inner
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

impl<W: Write> OutputWriter for CsvWriter<W> {
    fn write_row(&mut self, row: &TrajectoryRow) -> OutputResult<()> {
        self.inner.serialize(row)?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}
