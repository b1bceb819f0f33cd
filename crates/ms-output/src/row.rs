//! The flat record one snapshot produces per active driver.

use ms_driver::DriverObservable;

/// One driver-tick trajectory record.
#[derive(Clone, Debug, serde::Serialize)]
pub struct TrajectoryRow {
    pub tick: u64,
    pub driver: u32,
    pub x: f64,
    pub y: f64,
    /// Dense arena id of the current segment; empty inside intersections.
    pub segment: Option<u32>,
    pub lane_index: usize,
    pub offset_m: f64,
    pub speed_mps: f64,
    pub in_intersection: bool,
    pub queuing: bool,
}

impl TrajectoryRow {
    pub fn from_observable(tick: u64, driver: u32, obs: &DriverObservable) -> Self {
        Self {
            tick,
            driver,
            x: obs.position.x,
            y: obs.position.y,
            segment: obs.segment.map(|s| s.0),
            lane_index: obs.lane_index,
            offset_m: obs.dist_along_segment,
            speed_mps: obs.velocity,
            in_intersection: obs.in_intersection,
            queuing: obs.is_queuing,
        }
    }
}
