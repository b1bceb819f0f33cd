//! `ms-core` — foundational types for the microsim short-term driving core.
//!
//! This crate is a dependency of every other `ms-*` crate.  It intentionally
//! has no `ms-*` dependencies and minimal external ones (`rand`, `thiserror`,
//! `serde` for the config surface).
//!
//! # What lives here
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`ids`]    | `NodeId`, `LinkId`, `SegmentId`, `LaneId`, `DriverId`, …   |
//! | [`units`]  | `Centimeters`, `Meters`, `Seconds`, `Millis`, speed types  |
//! | [`time`]   | `Tick`, `SimClock`                                         |
//! | [`config`] | `SimConfig`, granularities, mutex strategy, reaction times |
//! | [`rng`]    | `DriverRng` (per-driver), `SimRng` (global)                |
//! | [`params`] | `ParameterManager` — named MITSIM parameter tables         |
//! | [`error`]  | `CoreError`, `CoreResult`                                  |

pub mod config;
pub mod error;
pub mod ids;
pub mod params;
pub mod rng;
pub mod time;
pub mod units;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{Granularities, MutexStrategy, ReactionTimeDist, ReactionTimeKind, SimConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{
    BusStopId, ConnectorId, DriverId, LaneId, LinkId, NodeId, SegmentId, TurningGroupId,
    TurningPathId,
};
pub use params::{ParameterManager, SpeedIndexedTable};
pub use rng::{DriverRng, SimRng};
pub use time::{SimClock, Tick};
pub use units::{Centimeters, Meters, MetersPerSec, MetersPerSec2, Millis, Seconds};
