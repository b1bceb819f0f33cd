//! Value types shared by the behavioral models.

use ms_core::DriverId;

// ── Nearest vehicles ──────────────────────────────────────────────────────────

/// Sentinel distance meaning "nothing within the visibility envelope".
pub const NO_VEHICLE_DISTANCE: f64 = 500.0;

/// Snapshot of the nearest vehicle in one direction.
///
/// Holds tick T−1 values copied out of the neighbor's observable buffer —
/// a non-owning record valid only for the current tick.
#[derive(Copy, Clone, Debug)]
pub struct NearestVehicle {
    pub driver: Option<DriverId>,
    /// Bumper-to-bumper gap along the lane polyline, metres.
    pub distance: f64,
    /// Neighbor's forward speed, m/s.
    pub velocity: f64,
    /// Neighbor's forward acceleration, m/s².
    pub acceleration: f64,
}

impl NearestVehicle {
    #[inline]
    pub fn exists(&self) -> bool {
        self.driver.is_some()
    }
}

impl Default for NearestVehicle {
    fn default() -> Self {
        Self {
            driver: None,
            distance: NO_VEHICLE_DISTANCE,
            velocity: 0.0,
            acceleration: 0.0,
        }
    }
}

/// Nearest pedestrian on a crossing ahead.
#[derive(Copy, Clone, Debug)]
pub struct NearestPedestrian {
    pub distance: f64,
    pub present: bool,
}

impl Default for NearestPedestrian {
    fn default() -> Self {
        Self {
            distance: NO_VEHICLE_DISTANCE,
            present: false,
        }
    }
}

/// The full set of neighbor slots the neighbor query fills each tick.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeighborSet {
    pub fwd: NearestVehicle,
    pub back: NearestVehicle,
    pub left_fwd: NearestVehicle,
    pub left_back: NearestVehicle,
    pub right_fwd: NearestVehicle,
    pub right_back: NearestVehicle,
    /// Second-adjacent lanes.
    pub left_fwd2: NearestVehicle,
    pub left_back2: NearestVehicle,
    pub right_fwd2: NearestVehicle,
    pub right_back2: NearestVehicle,
    /// Downstream lookahead across the coming intersection.
    pub fwd_next_link: NearestVehicle,
    pub ped_fwd: NearestPedestrian,
}

// ── Lane change enums ─────────────────────────────────────────────────────────

/// Which side a lane change (or turning movement) goes.  Higher lane index
/// is further left.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LaneChangeSide {
    Left,
    #[default]
    Same,
    Right,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LaneChangeMode {
    #[default]
    Discretionary,
    Mandatory,
}

/// Gap-acceptance outcome per side.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct LaneSide {
    pub left: bool,
    pub right: bool,
}

impl LaneSide {
    #[inline]
    pub fn left_only(self) -> bool {
        self.left && !self.right
    }

    #[inline]
    pub fn right_only(self) -> bool {
        self.right && !self.left
    }

    #[inline]
    pub fn both(self) -> bool {
        self.left && self.right
    }
}

/// The adjacent gap a driver steers toward while preparing a lane change.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum TargetGap {
    #[default]
    Same,
    LeftFwd,
    LeftAdj,
    LeftBack,
    RightFwd,
    RightAdj,
    RightBack,
}

// ── Stop points ───────────────────────────────────────────────────────────────

/// State machine for servicing a stop point on the current segment.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum StopPointState {
    #[default]
    NotPresent,
    Approaching,
    Close,
    JustArrived,
    Waiting,
    Leaving,
}
