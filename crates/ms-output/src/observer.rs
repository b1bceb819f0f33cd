//! Bridges the scheduler's observer seam to an [`OutputWriter`].

use ms_core::Tick;
use ms_driver::DriverObservable;
use ms_sim::SimObserver;

use crate::error::OutputResult;
use crate::row::TrajectoryRow;
use crate::writer::OutputWriter;

/// Writes one row per active driver at every snapshot callback.
///
/// Write errors are remembered rather than panicking mid-run; check
/// [`TrajectoryObserver::finish`] after the run.
pub struct TrajectoryObserver<W: OutputWriter> {
    writer: W,
    rows_written: usize,
    first_error: Option<crate::error::OutputError>,
}

impl<W: OutputWriter> TrajectoryObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            rows_written: 0,
            first_error: None,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and surface any error swallowed during the run.
    pub fn finish(mut self) -> OutputResult<W> {
        if let Some(e) = self.first_error.take() {
            return Err(e);
        }
        self.writer.finish()?;
        Ok(self.writer)
    }
}

impl<W: OutputWriter> SimObserver for TrajectoryObserver<W> {
    fn on_snapshot(&mut self, tick: Tick, observables: &[Option<DriverObservable>]) {
        if self.first_error.is_some() {
            return;
        }
        for (i, obs) in observables.iter().enumerate() {
            let Some(obs) = obs else { continue };
            let row = TrajectoryRow::from_observable(tick.0, i as u32, obs);
            if let Err(e) = self.writer.write_row(&row) {
                self.first_error = Some(e);
                return;
            }
            self.rows_written += 1;
        }
    }
}
