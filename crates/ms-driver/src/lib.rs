//! `ms-driver` — driver agents for the microscopic driving core.
//!
//! # Crate layout
//!
//! | Module           | Contents                                              |
//! |------------------|-------------------------------------------------------|
//! | [`vehicle`]      | `Vehicle` — the resource a driver owns                |
//! | [`path`]         | `PathMover` — polyline-accurate cursor over segments  |
//! | [`intersection`] | driver-side slot protocol + turn-speed cap            |
//! | [`agent`]        | `DriverAgent` frame cycle, `DriverObservable`         |
//! | [`bus`]          | `Role`, bus dwell times, per-bus stop service         |
//! | [`models`]       | `DriverModels` — shared CF/LC model bundle            |
//!
//! The scheduler in `ms-sim` owns the loop; this crate owns everything that
//! happens *within* one driver's tick.

pub mod agent;
pub mod bus;
pub mod error;
pub mod intersection;
pub mod models;
pub mod path;
pub mod vehicle;


pub use agent::{DriverAgent, DriverObservable, FrameInput, FrameOutput};
pub use bus::{dwell_time, BusDriverState, Role};
pub use error::{DriverError, DriverResult};
pub use intersection::{turn_speed_cap, ApproachPhase, SlotAction, SlotDriving, REQUEST_DISTANCE};
pub use models::DriverModels;
pub use path::{Advance, PathMover};
pub use vehicle::{Vehicle, VehicleType};
