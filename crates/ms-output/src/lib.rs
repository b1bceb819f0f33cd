//! `ms-output` — trajectory output for the driving core.
//!
//! The core itself persists nothing; this crate is the optional sink an
//! application attaches through the observer seam:
//!
//! ```rust,ignore
//! let writer = CsvWriter::create(&path)?;
//! let mut observer = TrajectoryObserver::new(writer, 10); // every 10 ticks
//! sim.run(&mut observer)?;
//! observer.finish()?;
//! ```
//!
//! | Module     | Contents                                          |
//! |------------|---------------------------------------------------|
//! | [`row`]    | `TrajectoryRow` — one driver-tick record          |
//! | [`writer`] | `OutputWriter` trait                              |
//! | [`csv`]    | `CsvWriter` — serde-backed CSV sink               |
//! | [`observer`] | `TrajectoryObserver` — bridges `SimObserver`    |

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;


pub use crate::csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::TrajectoryObserver;
pub use row::TrajectoryRow;
pub use writer::OutputWriter;
