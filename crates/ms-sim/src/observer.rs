//! Simulation observer trait for progress reporting and data collection.

use ms_core::{DriverId, Tick};
use ms_driver::DriverObservable;

/// Callbacks invoked by [`Scheduler::run`][crate::Scheduler::run] at key
/// points in the tick loop.  All methods have default no-op implementations.
pub trait SimObserver {
    /// Start of a tick, before any phase runs.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// End of a tick.  `active` is the number of drivers updated.
    fn on_tick_end(&mut self, _tick: Tick, _active: usize) {}

    /// Snapshot intervals (`config.output_interval_ticks`).  Entries are
    /// `None` for never-dispatched or reaped driver slots.
    fn on_snapshot(&mut self, _tick: Tick, _observables: &[Option<DriverObservable>]) {}

    /// A driver finished its path (or was dropped) and left the simulation.
    fn on_driver_removed(&mut self, _tick: Tick, _driver: DriverId) {}

    /// After the final tick.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
