//! CSV trip loader — the pending-driver input of the dispatch phase.
//!
//! # CSV format
//!
//! One row per trip:
//!
//! ```csv
//! start_ms,origin,destination,desired_speed_mps,vehicle
//! 0,1,3,15.0,car
//! 2000,1,3,15.0,bus
//! ```
//!
//! `origin`/`destination` are external (loader) node ids; routing to a
//! segment sequence happens at dispatch time so a trip can still be dropped
//! with a warning if the reduced network lost its path.

use std::io::Read;
use std::path::Path;

use ms_core::Millis;
use ms_driver::VehicleType;
use serde::Deserialize;

use crate::error::{SimError, SimResult};

/// One pending trip, ordered by start time.
#[derive(Clone, Debug)]
pub struct Trip {
    pub start: Millis,
    pub origin_ext: u64,
    pub destination_ext: u64,
    pub desired_speed: f64,
    pub vehicle: VehicleType,
}

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TripRecord {
    start_ms: u64,
    origin: u64,
    destination: u64,
    desired_speed_mps: f64,
    vehicle: String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load trips from a CSV file.
pub fn load_trips_csv(path: &Path) -> SimResult<Vec<Trip>> {
    let file = std::fs::File::open(path).map_err(SimError::Io)?;
    load_trips_reader(file)
}

/// Like [`load_trips_csv`] but accepts any `Read` source (tests pass a
/// `std::io::Cursor`).
pub fn load_trips_reader<R: Read>(reader: R) -> SimResult<Vec<Trip>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut trips = Vec::new();
    for result in csv_reader.deserialize::<TripRecord>() {
        let row = result.map_err(|e| SimError::Demand(e.to_string()))?;
        trips.push(Trip {
            start: Millis(row.start_ms),
            origin_ext: row.origin,
            destination_ext: row.destination,
            desired_speed: row.desired_speed_mps,
            vehicle: parse_vehicle(&row.vehicle)?,
        });
    }
    Ok(trips)
}

fn parse_vehicle(s: &str) -> SimResult<VehicleType> {
    match s.trim().to_ascii_lowercase().as_str() {
        "car" => Ok(VehicleType::Car),
        "bus" => Ok(VehicleType::Bus),
        "taxi" => Ok(VehicleType::Taxi),
        other => Err(SimError::Demand(format!(
            "unknown vehicle type {other:?}: expected car, bus, or taxi"
        ))),
    }
}
