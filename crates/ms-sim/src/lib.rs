//! `ms-sim` — the fixed-tick scheduler for the microscopic driving core.
//!
//! # Five-phase tick loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① Dispatch — promote pending trips whose start time <= now.
//!   ② Update   — each driver's frame_tick; reads come from the tick T−1
//!                buffers (parallel with the `parallel` feature).
//!   ③ Flip     — swap all double-buffered observables.
//!   ④ Deliver  — intersection managers consume their request batches;
//!                replies land in driver inboxes the same tick.
//!   ⑤ Reap     — remove drivers flagged to_be_removed.
//! ```
//!
//! Determinism: with a fixed seed the run is reproducible — the apply step
//! walks drivers in ascending id, message recipients drain in `Recipient`
//! order, and every driver owns an independent seeded RNG, so the parallel
//! feature changes wall-clock time only.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                          |
//! |------------|-------------------------------------------------|
//! | `parallel` | Runs the update phase on Rayon's thread pool.   |

pub mod buffer;
pub mod builder;
pub mod demand;
pub mod error;
pub mod neighbors;
pub mod observer;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use buffer::{Buffered, Locked, Shared};
pub use builder::SimBuilder;
pub use demand::{load_trips_csv, load_trips_reader, Trip};
pub use error::{SimError, SimResult};
pub use neighbors::{query, LaneIndex, QueryOrigin, VisibilityEnvelope};
pub use observer::{NoopObserver, SimObserver};
pub use scheduler::{Scheduler, SimStats};
