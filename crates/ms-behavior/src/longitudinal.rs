//! The longitudinal (car-following) model.
//!
//! A modified GM model: each tick the final acceleration is the most
//! restrictive of the rates produced by the active constraints —
//! car-following against the leader (current lane and next link), signal
//! response, yielding toward the turn side, waiting for a lane-change gap,
//! the three target-gap pull-in rates, and the stop-point service machine.
//!
//! Regimes are selected by headway `h = 2s / (v + v + Δt·a_max)` against the
//! lower/upper buffer thresholds: below the lower buffer the emergency rate
//! applies, above the upper buffer free-flow (or braking toward the leader's
//! projected state when the gap is inside the normal stopping distance),
//! in between the calibrated car-following power law.

use ms_core::{CoreResult, DriverRng, ParameterManager, SpeedIndexedTable};

use crate::types::{LaneChangeSide, NearestVehicle, StopPointState, TargetGap};
use crate::update_params::DriverUpdateParams;

const DIST_EPSILON: f64 = 0.001;

/// MITSIM noise terms are calibrated in ft/s²; this converts the normal draw
/// into the model's m/s² scale.
const FT_NOISE_TO_SI: f64 = 0.158;

// ── Parameters ────────────────────────────────────────────────────────────────

/// One row of car-following power-law coefficients.
#[derive(Copy, Clone, Debug)]
pub struct CfRegime {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub lambda: f64,
    pub rho: f64,
    pub stddev: f64,
}

impl CfRegime {
    fn from_slice(v: &[f64]) -> Self {
        Self {
            alpha: v[0],
            beta: v[1],
            gamma: v[2],
            lambda: v[3],
            rho: v[4],
            stddev: v[5],
        }
    }
}

/// All parameters the longitudinal model reads, assembled by name from the
/// [`ParameterManager`].
pub struct CarFollowingParams {
    pub max_acc: SpeedIndexedTable,
    pub normal_dec: SpeedIndexedTable,
    pub max_dec: SpeedIndexedTable,
    pub max_acc_scale: Vec<f64>,
    pub grade_factor: f64,
    /// Road grade as a fraction; flat networks use 0.
    pub grade: f64,
    pub h_buffer_lower: f64,
    pub h_buffer_upper: f64,
    /// Leader-slower row (index 0) and leader-faster row (index 1).
    pub cf_accelerating: CfRegime,
    pub cf_decelerating: CfRegime,
    pub target_gap_acc: Vec<f64>,
    pub yellow_stop_headway: f64,
    pub min_speed_yellow: f64,
}

impl CarFollowingParams {
    pub fn from_manager(pm: &ParameterManager) -> CoreResult<Self> {
        Ok(Self {
            max_acc: pm.speed_indexed_table("max_acc_car1")?,
            normal_dec: pm.speed_indexed_table("normal_deceleration_car1")?,
            max_dec: pm.speed_indexed_table("max_deceleration_car1")?,
            max_acc_scale: pm.param_vec("max_acceleration_scale")?,
            grade_factor: pm.param_f64("acceleration_grade_factor")?,
            grade: 0.0,
            h_buffer_lower: pm.param_f64("headway_buffer_lower")?,
            h_buffer_upper: pm.param_f64("headway_buffer_upper")?,
            cf_accelerating: CfRegime::from_slice(&pm.param_vec_exact("cf_param_accelerating", 6)?),
            cf_decelerating: CfRegime::from_slice(&pm.param_vec_exact("cf_param_decelerating", 6)?),
            target_gap_acc: pm.param_vec_exact("target_gap_acc_params", 13)?,
            yellow_stop_headway: 1.0,
            min_speed_yellow: 2.2352, // 5 mph
        })
    }
}

/// Headway to a leader `space` metres ahead, projecting own speed one tick
/// of maximum acceleration forward.  Zero speed degenerates to a huge value.
pub fn calc_headway(space: f64, speed: f64, elapsed: f64, max_acc: f64) -> f64 {
    if speed <= 0.0 {
        2.0 * space * 100_000.0
    } else {
        2.0 * space / (speed + speed + elapsed * max_acc)
    }
}

// ── Model ─────────────────────────────────────────────────────────────────────

pub struct CarFollowingModel {
    pub params: CarFollowingParams,
}

impl CarFollowingModel {
    pub fn new(params: CarFollowingParams) -> Self {
        Self { params }
    }

    pub fn from_manager(pm: &ParameterManager) -> CoreResult<Self> {
        Ok(Self::new(CarFollowingParams::from_manager(pm)?))
    }

    /// The most restrictive acceleration among all active constraints,
    /// clamped into the speed-indexed `[max_dec, max_acc]` envelope.
    pub fn make_accelerating_decision(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> f64 {
        let target_speed = p.desired_speed;
        let max_lane_speed = p.max_lane_speed;

        p.max_acceleration = self.max_acceleration(p, rng);
        p.normal_deceleration = -self.params.normal_dec.lookup(p.perceived_velocity);
        p.max_deceleration = -self.params.max_dec.lookup(p.perceived_velocity);
        self.update_distance_to_normal_stop(p);

        let mut acc = p.max_acceleration;
        acc = acc.min(self.calc_yielding_rate(p, rng, target_speed, max_lane_speed));
        acc = acc.min(self.calc_adjacent_rate(p));
        acc = acc.min(self.calc_backward_rate(p));
        acc = acc.min(self.calc_forward_rate(p));
        acc = acc.min(self.calc_signal_rate(p));
        acc = acc.min(self.wait_exit_lane_rate(p));
        acc = acc.min(self.calc_stop_point_rate(p));
        let fwd = p.neighbors.fwd;
        acc = acc.min(self.car_following_rate(p, rng, target_speed, max_lane_speed, &fwd));
        let next_link = p.neighbors.fwd_next_link;
        acc = acc.min(self.car_following_rate(p, rng, target_speed, max_lane_speed, &next_link));

        acc.clamp(p.max_deceleration, p.max_acceleration)
    }

    // ── Kinematic bounds ──────────────────────────────────────────────────

    /// Speed-indexed table value, grade-adjusted, scaled by a random draw
    /// from the discrete multiplier distribution.
    fn max_acceleration(&self, p: &DriverUpdateParams, rng: &mut DriverRng) -> f64 {
        let table = self.params.max_acc.lookup(p.perceived_velocity);
        let scale = {
            let n = self.params.max_acc_scale.len();
            self.params.max_acc_scale[rng.gen_range(0..n)]
        };
        (table - self.params.grade * self.params.grade_factor) * scale
    }

    fn update_distance_to_normal_stop(&self, p: &mut DriverUpdateParams) {
        const MIN_SPEED: f64 = 0.1;
        const MIN_RESPONSE_DISTANCE: f64 = 5.0;
        p.distance_to_normal_stop = if p.perceived_velocity > MIN_SPEED {
            let d = DIST_EPSILON
                - 0.5 * p.perceived_velocity * p.perceived_velocity / p.normal_deceleration;
            d.max(MIN_RESPONSE_DISTANCE)
        } else {
            MIN_RESPONSE_DISTANCE
        };
    }

    // ── Car following ─────────────────────────────────────────────────────

    /// Acceleration rate by the car-following constraint against `nv`.
    ///
    /// Also used to find the potential rate in neighbor lanes, so `nv` is
    /// not necessarily in the driver's own lane.
    pub fn car_following_rate(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
        target_speed: f64,
        max_lane_speed: f64,
        nv: &NearestVehicle,
    ) -> f64 {
        p.space = p.perceived_dist_to_lead;

        // Crawling start directly behind a stopped queue before an
        // intersection: cut acceleration hard.
        if p.space < 2.0
            && p.is_already_started
            && p.is_before_intersection
            && p.perceived_lead_velocity < 1.0
        {
            return p.max_deceleration * 4.0;
        }
        if p.space <= 0.0 {
            return 0.0;
        }
        if !nv.exists() {
            return self.acc_of_free_flowing(p, target_speed, max_lane_speed);
        }

        p.v_lead = nv.velocity;
        p.a_lead = nv.acceleration;

        let dt = p.elapsed_seconds;
        let mut headway = calc_headway(p.space, p.perceived_velocity, dt, p.max_acceleration);

        // The emergency check uses the un-delayed gap: a vehicle suddenly
        // close overrides the perceived distance.
        let emerg_space = nv.distance;
        let emerg_headway = calc_headway(emerg_space, p.perceived_velocity, dt, p.max_acceleration);
        if emerg_headway < self.params.h_buffer_lower {
            p.space = emerg_space;
            headway = emerg_headway;
        }
        p.headway = headway;
        p.emerg_headway = emerg_headway;

        p.space_star = p.space + p.v_lead * dt + 0.5 * p.a_lead * dt * dt;

        if headway < self.params.h_buffer_lower {
            self.acc_of_emergency_decelerating(p)
        } else if headway > self.params.h_buffer_upper {
            self.acc_of_mix_of_cf_and_ff(p, target_speed, max_lane_speed)
        } else {
            self.acc_of_car_following(p, rng)
        }
    }

    fn acc_of_emergency_decelerating(&self, p: &mut DriverUpdateParams) -> f64 {
        const EPSILON_V: f64 = 0.001;
        let v = p.perceived_velocity;
        let dv = v - p.v_lead;

        let a = if dv < EPSILON_V {
            p.a_lead + 0.25 * p.normal_deceleration
        } else if p.space > 0.01 {
            p.a_lead - dv * dv / (2.0 * p.space)
        } else {
            let s = p.space_star;
            let vt = p.v_lead + p.a_lead * p.elapsed_seconds;
            self.brake_to_target_speed(p, s, vt)
        };
        a.max(p.max_deceleration)
    }

    fn acc_of_car_following(&self, p: &mut DriverUpdateParams, rng: &mut DriverRng) -> f64 {
        // Density of vehicles ahead; a mesoscopic input, unity in the core.
        let density: f64 = 1.0;
        let v = p.perceived_velocity;
        let closing = v > p.v_lead;
        let regime = if closing {
            self.params.cf_decelerating
        } else {
            self.params.cf_accelerating
        };
        let dv = (v - p.v_lead).abs();

        let mut res = regime.alpha * v.powf(regime.beta) / p.space.powf(regime.gamma);
        res *= dv.powf(regime.lambda) * density.powf(regime.rho);
        res += FT_NOISE_TO_SI * rng.normal(0.0, regime.stddev);
        res
    }

    fn acc_of_free_flowing(
        &self,
        p: &DriverUpdateParams,
        target_speed: f64,
        max_lane_speed: f64,
    ) -> f64 {
        let vn = p.perceived_velocity;
        if vn < target_speed {
            if vn < max_lane_speed { p.max_acceleration } else { 0.0 }
        } else if vn > target_speed {
            0.0
        } else if vn < max_lane_speed {
            p.max_acceleration
        } else {
            0.0
        }
    }

    fn acc_of_mix_of_cf_and_ff(
        &self,
        p: &mut DriverUpdateParams,
        target_speed: f64,
        max_lane_speed: f64,
    ) -> f64 {
        if p.space > p.distance_to_normal_stop {
            self.acc_of_free_flowing(p, target_speed, max_lane_speed)
        } else {
            let s = p.space_star;
            let vt = p.v_lead + p.a_lead * p.elapsed_seconds;
            self.brake_to_target_speed(p, s, vt)
        }
    }

    // ── Braking primitives ────────────────────────────────────────────────

    /// Rate required to come to a full stop within `dis` metres.
    ///
    /// When the simple `−v²/2s` rate is gentler than normal deceleration, a
    /// quadratic solve finds the rate that reaches zero speed exactly at the
    /// line given one tick of reaction.
    pub fn brake_to_stop(&self, p: &DriverUpdateParams, dis: f64) -> f64 {
        let v = p.perceived_velocity;
        if dis > DIST_EPSILON {
            let u2 = v * v;
            let acc = -u2 / (2.0 * dis);
            if acc <= p.normal_deceleration {
                return acc;
            }
            let dt = p.elapsed_seconds;
            let vt = v * dt;
            let a = dt * dt;
            let b = 2.0 * vt - p.normal_deceleration * a;
            let c = u2 + 2.0 * p.normal_deceleration * (dis - vt);
            let d = b * b - 4.0 * a * c;
            if d < 0.0 || a <= 0.0 {
                return acc;
            }
            (d.sqrt() - b) / a * 0.5
        } else if p.elapsed_seconds > 0.0 {
            -v / p.elapsed_seconds
        } else {
            p.max_deceleration
        }
    }

    /// Rate required to reach `v_target` within `s` metres.
    fn brake_to_target_speed(&self, p: &DriverUpdateParams, s: f64, v_target: f64) -> f64 {
        let u = p.perceived_velocity;
        if s > DIST_EPSILON {
            (v_target * v_target - u * u) / (2.0 * s)
        } else {
            (v_target - u) / p.elapsed_seconds
        }
    }

    // ── Signal response ───────────────────────────────────────────────────

    fn calc_signal_rate(&self, p: &DriverUpdateParams) -> f64 {
        use ms_perception::TrafficColor::*;
        let minacc = p.max_acceleration;
        let Some((color, dist)) = p.perceived_signal else {
            return minacc;
        };
        if dist >= 500.0 {
            return minacc;
        }
        match color {
            Red => {
                // At the line: hold, don't creep across.
                if dist <= 1.0 {
                    return minacc.min(self.hold_still(p));
                }
                minacc.min(self.brake_to_stop(p, dist))
            }
            Amber => {
                let approach_speed = p.perceived_velocity.max(self.params.min_speed_yellow);
                if dist / approach_speed > self.params.yellow_stop_headway {
                    minacc.min(self.brake_to_stop(p, dist))
                } else {
                    minacc
                }
            }
            Green => minacc,
        }
    }

    // ── Yielding and lane-exit waiting ────────────────────────────────────

    /// While committed to a turn, also follow the target lane's leader.
    fn calc_yielding_rate(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
        target_speed: f64,
        max_lane_speed: f64,
    ) -> f64 {
        match p.turning_direction {
            LaneChangeSide::Left => {
                let nv = p.neighbors.left_fwd;
                self.car_following_rate(p, rng, target_speed, max_lane_speed, &nv)
            }
            LaneChangeSide::Right => {
                let nv = p.neighbors.right_fwd;
                self.car_following_rate(p, rng, target_speed, max_lane_speed, &nv)
            }
            LaneChangeSide::Same => p.max_acceleration,
        }
    }

    /// Decelerate toward the back of the queue when stuck waiting to reach
    /// the exit lane.
    fn wait_exit_lane_rate(&self, p: &DriverUpdateParams) -> f64 {
        let dx = p.perceived_dist_to_lead - 5.0;
        if p.turning_direction == LaneChangeSide::Same || dx > p.distance_to_normal_stop {
            p.max_acceleration
        } else {
            self.brake_to_stop(p, dx)
        }
    }

    // ── Target-gap pull-in rates ──────────────────────────────────────────

    fn calc_forward_rate(&self, p: &DriverUpdateParams) -> f64 {
        let g = &self.params.target_gap_acc;
        let nv = match p.target_gap {
            TargetGap::LeftFwd => p.neighbors.left_fwd,
            TargetGap::RightFwd => p.neighbors.right_fwd,
            _ => return p.max_acceleration,
        };
        if !nv.exists() {
            return p.max_acceleration;
        }
        let dis = nv.distance + g[0];
        let dv = nv.velocity - p.perceived_velocity;
        let mut acc = g[1] * dis.powf(g[2]);
        if dv > 0.0 {
            acc *= dv.powf(g[3]);
        } else if dv < 0.0 {
            acc *= (-dv).powf(g[4]);
        }
        acc + g[5] / 0.824
    }

    fn calc_backward_rate(&self, p: &DriverUpdateParams) -> f64 {
        let g = &self.params.target_gap_acc;
        let nv = match p.target_gap {
            TargetGap::LeftBack => p.neighbors.left_back,
            TargetGap::RightBack => p.neighbors.right_back,
            _ => return p.max_acceleration,
        };
        if !nv.exists() {
            return p.max_acceleration;
        }
        let dis = nv.distance + g[0];
        let dv = nv.velocity - p.perceived_velocity;
        let mut acc = g[6] * dis.powf(g[7]);
        if dv > 0.0 {
            acc *= dv.powf(g[8]);
        } else if dv < 0.0 {
            acc *= (-dv).powf(g[9]);
        }
        acc + g[10] / 0.824
    }

    fn calc_adjacent_rate(&self, p: &DriverUpdateParams) -> f64 {
        let g = &self.params.target_gap_acc;
        if p.next_lane_index == p.curr_lane_index {
            return p.max_acceleration;
        }
        let (av, bv) = if p.next_lane_index > p.curr_lane_index {
            (p.neighbors.left_fwd, p.neighbors.left_back)
        } else {
            (p.neighbors.right_fwd, p.neighbors.right_back)
        };
        if !av.exists() {
            return p.max_acceleration;
        }
        if !bv.exists() {
            return p.normal_deceleration;
        }
        let gap = bv.distance + av.distance;
        let position = bv.distance;
        g[11] * (g[0] * gap - position) + g[12] / 0.824
    }

    // ── Stop points ───────────────────────────────────────────────────────

    /// Advance the stop-point state machine and produce its rate.
    ///
    /// The driver agent refreshes `dist_to_stop_point` and `stop_dwell_sec`
    /// from the upcoming stop-point obstacle before calling the model;
    /// `NotPresent` means no stop point remains on the path.
    fn calc_stop_point_rate(&self, p: &mut DriverUpdateParams) -> f64 {
        const PERCEPTION_DISTANCE: f64 = 50.0;
        const ARRIVE_DISTANCE: f64 = 2.0;
        const CRAWL_SPEED: f64 = 0.1;

        match p.stop_state {
            StopPointState::NotPresent | StopPointState::Leaving => p.max_acceleration,

            StopPointState::Approaching => {
                if p.dist_to_stop_point <= PERCEPTION_DISTANCE {
                    p.stop_state = StopPointState::Close;
                    self.brake_to_stop(p, p.dist_to_stop_point)
                } else {
                    p.max_acceleration
                }
            }

            StopPointState::Close => {
                if p.dist_to_stop_point <= ARRIVE_DISTANCE && p.perceived_velocity <= CRAWL_SPEED {
                    p.stop_state = StopPointState::JustArrived;
                }
                self.brake_to_stop(p, p.dist_to_stop_point.max(0.0))
            }

            StopPointState::JustArrived => {
                p.stop_state = StopPointState::Waiting;
                p.stop_wait_started_sec = p.now_sec;
                self.hold_still(p)
            }

            StopPointState::Waiting => {
                if p.now_sec - p.stop_wait_started_sec >= p.stop_dwell_sec {
                    p.stop_state = StopPointState::Leaving;
                    p.max_acceleration
                } else {
                    self.hold_still(p)
                }
            }
        }
    }

    #[inline]
    fn hold_still(&self, p: &DriverUpdateParams) -> f64 {
        if p.elapsed_seconds > 0.0 {
            -p.perceived_velocity / p.elapsed_seconds
        } else {
            0.0
        }
    }
}
