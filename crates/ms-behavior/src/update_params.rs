//! `DriverUpdateParams` — the per-tick scratch pad.
//!
//! Constructed once per driver and `reset` at the start of every tick.
//! Scratch fields are cleared; sticky fields (lane-change hysteresis,
//! stop-point progress, the intersection-slot latch) carry over because the
//! models depend on them across ticks.

use ms_perception::TrafficColor;

use crate::types::{
    LaneChangeMode, LaneChangeSide, NeighborSet, StopPointState, TargetGap, NO_VEHICLE_DISTANCE,
};

/// Distance sentinel for "no mandatory point ahead" (metres).
pub const NO_STOP_AHEAD: f64 = 5_000.0;

#[derive(Clone, Debug)]
pub struct DriverUpdateParams {
    // ── Timing ────────────────────────────────────────────────────────────
    /// Tick length, seconds.
    pub elapsed_seconds: f64,
    /// Simulation time at the start of this tick, seconds.
    pub now_sec: f64,

    // ── Lane context ──────────────────────────────────────────────────────
    pub curr_lane_index: usize,
    /// Lane the driver must reach for its downstream turning movement.
    pub next_lane_index: usize,
    /// Lane count on the current segment.
    pub lane_count: usize,
    pub has_left_lane: bool,
    pub has_right_lane: bool,
    pub has_left_lane2: bool,
    pub has_right_lane2: bool,
    /// Speed limit of the current lane's segment, m/s.
    pub max_lane_speed: f64,
    /// This driver's desired cruise speed, m/s.
    pub desired_speed: f64,

    // ── Perceived quantities (delayed, SI) ────────────────────────────────
    pub perceived_velocity: f64,
    pub perceived_acceleration: f64,
    pub perceived_dist_to_lead: f64,
    pub perceived_lead_velocity: f64,
    pub perceived_lead_acceleration: f64,
    /// Perceived signal color and distance to its stop line, if a signal is
    /// within sensing range.
    pub perceived_signal: Option<(TrafficColor, f64)>,

    // ── Neighbors (tick T−1 snapshots) ────────────────────────────────────
    pub neighbors: NeighborSet,

    // ── Path context ──────────────────────────────────────────────────────
    /// Distance to the point where the driver must be in its turning lane
    /// (the stop line of the coming intersection), metres.
    pub dist_to_stop: f64,
    /// Distance needed to stop comfortably from the current speed.
    pub distance_to_normal_stop: f64,
    pub is_before_intersection: bool,
    /// Set after the first tick in which the vehicle has moved.
    pub is_already_started: bool,

    // ── Car-following scratch ─────────────────────────────────────────────
    pub space: f64,
    pub space_star: f64,
    pub v_lead: f64,
    pub a_lead: f64,
    pub headway: f64,
    pub emerg_headway: f64,

    // ── Per-tick kinematic bounds (speed-indexed, scaled) ─────────────────
    pub max_acceleration: f64,
    /// Negative.
    pub normal_deceleration: f64,
    /// Negative.
    pub max_deceleration: f64,

    // ── Lane-change state (sticky) ────────────────────────────────────────
    /// Side of the turning movement the driver is committed to.
    pub turning_direction: LaneChangeSide,
    pub target_gap: TargetGap,
    pub is_mlc: bool,
    /// Set when the mandatory target side is blocked; the longitudinal model
    /// decelerates to wait for a gap.
    pub is_waiting: bool,
    pub last_decision: LaneChangeSide,
    pub last_change_mode: LaneChangeMode,
    /// Cool-down seconds before the lateral model may re-decide.
    pub cftimer: f64,

    // ── Stop point (sticky) ───────────────────────────────────────────────
    pub stop_state: StopPointState,
    /// Distance to the active stop point, metres; negative once passed.
    pub dist_to_stop_point: f64,
    /// Absolute offset of the active stop point on its segment, metres.
    pub stop_point_offset: f64,
    pub stop_dwell_sec: f64,
    pub stop_wait_started_sec: f64,

    // ── Intersection slot (sticky) ────────────────────────────────────────
    /// Granted arrival time at the stop line, seconds since sim start.
    pub access_time: f64,
    pub is_response_received: bool,
    /// The slot model overrode speed this tick; integration skips normal
    /// acceleration.
    pub use_int_acc: bool,

    // ── Outputs ───────────────────────────────────────────────────────────
    pub new_fwd_acc: f64,
    pub new_lat_vel: f64,
}

impl Default for DriverUpdateParams {
    fn default() -> Self {
        Self {
            elapsed_seconds: 0.1,
            now_sec: 0.0,
            curr_lane_index: 0,
            next_lane_index: 0,
            lane_count: 1,
            has_left_lane: false,
            has_right_lane: false,
            has_left_lane2: false,
            has_right_lane2: false,
            max_lane_speed: 0.0,
            desired_speed: 0.0,
            perceived_velocity: 0.0,
            perceived_acceleration: 0.0,
            perceived_dist_to_lead: NO_VEHICLE_DISTANCE,
            perceived_lead_velocity: 0.0,
            perceived_lead_acceleration: 0.0,
            perceived_signal: None,
            neighbors: NeighborSet::default(),
            dist_to_stop: NO_STOP_AHEAD,
            distance_to_normal_stop: 0.0,
            is_before_intersection: false,
            is_already_started: false,
            space: 0.0,
            space_star: 0.0,
            v_lead: 0.0,
            a_lead: 0.0,
            headway: 999.0,
            emerg_headway: 999.0,
            max_acceleration: 0.0,
            normal_deceleration: 0.0,
            max_deceleration: 0.0,
            turning_direction: LaneChangeSide::Same,
            target_gap: TargetGap::Same,
            is_mlc: false,
            is_waiting: false,
            last_decision: LaneChangeSide::Same,
            last_change_mode: LaneChangeMode::Discretionary,
            cftimer: 0.0,
            stop_state: StopPointState::NotPresent,
            dist_to_stop_point: NO_STOP_AHEAD,
            stop_point_offset: 0.0,
            stop_dwell_sec: 0.0,
            stop_wait_started_sec: 0.0,
            access_time: 0.0,
            is_response_received: false,
            use_int_acc: false,
            new_fwd_acc: 0.0,
            new_lat_vel: 0.0,
        }
    }
}

impl DriverUpdateParams {
    /// Start a new tick: clear scratch, keep sticky state, tick down the
    /// lane-change cool-down timer.
    pub fn reset(&mut self, now_sec: f64, elapsed_seconds: f64) {
        self.now_sec = now_sec;
        self.elapsed_seconds = elapsed_seconds;

        self.perceived_velocity = 0.0;
        self.perceived_acceleration = 0.0;
        self.perceived_dist_to_lead = NO_VEHICLE_DISTANCE;
        self.perceived_lead_velocity = 0.0;
        self.perceived_lead_acceleration = 0.0;
        self.perceived_signal = None;
        self.neighbors = NeighborSet::default();

        self.dist_to_stop = NO_STOP_AHEAD;
        self.distance_to_normal_stop = 0.0;
        self.is_before_intersection = false;

        self.space = 0.0;
        self.space_star = 0.0;
        self.v_lead = 0.0;
        self.a_lead = 0.0;
        self.headway = 999.0;
        self.emerg_headway = 999.0;

        self.use_int_acc = false;
        self.new_fwd_acc = 0.0;
        self.new_lat_vel = 0.0;

        self.cftimer = (self.cftimer - elapsed_seconds).max(0.0);
    }
}
