//! Bus-driver role: dwell-time computation and per-bus stop service state.

use ms_core::{BusStopId, Centimeters, SegmentId};

/// Dwell time at a stop, seconds.
///
/// `DT = β1 + max(PT_front, PT_rear) + β2·bay + β3·full` with
/// `PT_front = α·P_front·A + α2·B + α3·crowd·B` and
/// `PT_rear = α4·(1−P_front)·A`, where `A` alight, `B` board, and the
/// service-time constants assume smart-card payment and rear-door alighting.
pub fn dwell_time(
    passengers_on_board: u32,
    alighting: u32,
    boarding: u32,
    has_bay: bool,
    is_full: bool,
    p_front: f64,
) -> f64 {
    const ALPHA1: f64 = 2.1; // alighting passenger service time
    const ALPHA2: f64 = 3.5; // boarding passenger service time
    const ALPHA3: f64 = 3.5; // door opening and closing
    const ALPHA4: f64 = 1.0;
    const BETA1: f64 = 0.7;
    const BETA2: f64 = 0.7;
    const BETA3: f64 = 5.0;
    const NUM_SEATS: u32 = 40;

    let standing = passengers_on_board > NUM_SEATS;
    let crowdedness = if standing { 1.0 } else { 0.0 };
    let alpha = if standing { ALPHA1 + 0.5 } else { ALPHA1 };

    let a = alighting as f64;
    let b = boarding as f64;
    let pt_front = alpha * p_front * a + ALPHA2 * b + ALPHA3 * crowdedness * b;
    let pt_rear = ALPHA4 * (1.0 - p_front) * a;

    BETA1
        + pt_front.max(pt_rear)
        + BETA2 * f64::from(has_bay)
        + BETA3 * f64::from(is_full)
}

/// Per-bus stop-service bookkeeping.
///
/// Boarding/alighting counts come from the bus-stop collaborator in the full
/// system; here they are fixed per bus and stand in for the
/// `BOARD_BUS`/`ALIGHT_BUS` exchange.
#[derive(Clone, Debug)]
pub struct BusDriverState {
    pub passengers_on_board: u32,
    pub capacity: u32,
    /// Expected boarders / alighters per stop.
    pub boarding_per_stop: u32,
    pub alighting_per_stop: u32,
    /// Fraction of alighters using the front door.
    pub p_front: f64,
    /// The stop currently being serviced, if any.
    pub at_stop: Option<BusStopId>,
    /// Last stop fully served, so it is not serviced twice.
    pub last_served: Option<(SegmentId, Centimeters)>,
}

impl Default for BusDriverState {
    fn default() -> Self {
        Self {
            passengers_on_board: 0,
            capacity: 60,
            boarding_per_stop: 5,
            alighting_per_stop: 3,
            p_front: 0.0,
            at_stop: None,
            last_served: None,
        }
    }
}

impl BusDriverState {
    pub fn is_full(&self) -> bool {
        self.passengers_on_board >= self.capacity
    }

    /// Dwell for the coming stop with the current load.
    pub fn dwell_for(&self, has_bay: bool) -> f64 {
        dwell_time(
            self.passengers_on_board,
            self.alighting_per_stop,
            self.boarding_per_stop,
            has_bay,
            self.is_full(),
            self.p_front,
        )
    }

    /// Apply the passenger exchange at departure.
    pub fn exchange(&mut self) {
        self.passengers_on_board = self
            .passengers_on_board
            .saturating_sub(self.alighting_per_stop)
            .saturating_add(self.boarding_per_stop)
            .min(self.capacity);
    }
}

/// The role a driver agent plays.  Roles share the frame cycle; the variant
/// state changes what `check_for_stops` services.
#[derive(Clone, Debug)]
pub enum Role {
    Driver,
    BusDriver(BusDriverState),
}

impl Role {
    #[inline]
    pub fn is_bus(&self) -> bool {
        matches!(self, Role::BusDriver(_))
    }
}
