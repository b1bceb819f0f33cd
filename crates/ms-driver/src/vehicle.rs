//! The vehicle resource a driver owns.

use ms_behavior::LaneChangeSide;
use ms_core::Centimeters;
use ms_network::Point;

/// Passenger-car-unit divisor: one PCU is 4 m of vehicle.
const PCU_LENGTH: Centimeters = Centimeters(400);

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum VehicleType {
    #[default]
    Car,
    Bus,
    Taxi,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub vehicle_type: VehicleType,
    pub length: Centimeters,
    pub width: Centimeters,

    // ── Dynamic state ─────────────────────────────────────────────────────
    /// Forward speed, m/s.
    pub velocity: f64,
    /// Lateral speed, m/s (positive = toward the left lane).
    pub lat_velocity: f64,
    /// Forward acceleration, m/s².
    pub fwd_accel: f64,
    pub position: Point,
    /// Valid only while crossing an intersection.
    pub position_in_intersection: Point,
    pub turning_direction: LaneChangeSide,
    /// Off the travel lane (bus dwelling at a stop, queued at capacity).
    pub is_queuing: bool,
}

impl Vehicle {
    pub fn new(vehicle_type: VehicleType) -> Self {
        let (length, width) = match vehicle_type {
            VehicleType::Car | VehicleType::Taxi => (Centimeters(400), Centimeters(200)),
            VehicleType::Bus => (Centimeters(1_200), Centimeters(250)),
        };
        Self {
            vehicle_type,
            length,
            width,
            velocity: 0.0,
            lat_velocity: 0.0,
            fwd_accel: 0.0,
            position: Point::default(),
            position_in_intersection: Point::default(),
            turning_direction: LaneChangeSide::Same,
            is_queuing: false,
        }
    }

    /// Vehicle length in passenger-car units.
    #[inline]
    pub fn pcu(&self) -> f64 {
        self.length.0 as f64 / PCU_LENGTH.0 as f64
    }

    #[inline]
    pub fn length_m(&self) -> f64 {
        self.length.to_meters().0
    }
}
