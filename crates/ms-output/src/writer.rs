//! The sink abstraction the observer writes through.

use crate::error::OutputResult;
use crate::row::TrajectoryRow;

/// Anything that can persist trajectory rows.
pub trait OutputWriter {
    fn write_row(&mut self, row: &TrajectoryRow) -> OutputResult<()>;

    /// Flush buffered rows; called once at the end of the run.
    fn finish(&mut self) -> OutputResult<()>;
}
