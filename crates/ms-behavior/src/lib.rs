//! `ms-behavior` — the coupled MITSIM driving models.
//!
//! # Crate layout
//!
//! | Module          | Contents                                               |
//! |-----------------|--------------------------------------------------------|
//! | [`types`]       | nearest-vehicle records, lane-change enums, stop-point states |
//! | [`update_params`] | `DriverUpdateParams` — the per-tick scratch pad      |
//! | [`longitudinal`]| `CarFollowingModel` — acceleration decision            |
//! | [`lateral`]     | `LaneChangeModel` — lane-change decision + gap acceptance |
//!
//! # The per-tick contract
//!
//! The driver agent fills a `DriverUpdateParams` at the start of its tick
//! (perceived quantities, neighbor slots, lane context), then calls the
//! longitudinal model for `new_fwd_acc` and the lateral model for
//! `new_lat_vel`.  Both models read and write scratch fields on the params
//! struct; sticky fields (`last_decision`, `cftimer`, stop-point state, the
//! intersection-slot latch) survive across ticks via
//! [`DriverUpdateParams::reset`].
//!
//! All quantities are SI: metres, seconds, m/s, m/s².  The perception crate
//! normalizes units once; nothing here divides by 100.

pub mod lateral;
pub mod longitudinal;
pub mod types;
pub mod update_params;

#[cfg(test)]
mod tests;

pub use lateral::{LaneChangeModel, LaneChangeParams};
pub use longitudinal::{CarFollowingModel, CarFollowingParams};
pub use types::{
    LaneChangeMode, LaneChangeSide, LaneSide, NearestPedestrian, NearestVehicle, NeighborSet,
    StopPointState, TargetGap,
};
pub use update_params::DriverUpdateParams;
