//! The lateral (lane-change) model.
//!
//! Two coupled decisions each tick:
//!
//! 1. **Mode** — discretionary comfort change (DLC) vs. mandatory change
//!    toward the lane the downstream turning requires (MLC).  The switch to
//!    MLC is probabilistic in the distance remaining to the mandatory point,
//!    with courtesy and forced merging as relaxed-gap MLC variants.
//! 2. **Side** — gap acceptance against the lead and lag vehicles of each
//!    adjacent lane, using Kazi's critical-gap formulation with separate
//!    parameter rows per (mode, lead/lag).
//!
//! A decision persists across ticks through `last_decision` and the
//! `cftimer` cool-down; execution itself (lateral velocity accumulating into
//! a lane flip) is the driver agent's job.

use ms_core::{CoreResult, DriverRng, ParameterManager};

use crate::types::{
    LaneChangeMode, LaneChangeSide, LaneSide, NearestVehicle, TargetGap,
};
use crate::update_params::DriverUpdateParams;

const FEET_PER_METER: f64 = 3.2808;

/// Critical-gap parameter row indices (into the eight `LC_GAP_MODELS` rows).
const DLC_BASE: usize = 0;
const MLC_BASE: usize = 2;
const COURTESY_BASE: usize = 4;
const FORCED_BASE: usize = 6;

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
pub struct MlcParams {
    pub feet_lowbound: f64,
    pub feet_delta: f64,
    pub lane_coeff: f64,
    pub congest_coeff: f64,
    /// Minimum seconds between lateral re-decisions (the cool-down).
    pub lane_mintime: f64,
}

pub struct LaneChangeParams {
    /// Eight rows of (scale, alpha, lambda, beta0..beta4, stddev).
    pub gap_models: Vec<Vec<f64>>,
    /// Three rows of target-gap utility coefficients
    /// (const, dis2gap, gap-size, gap-vel, dummy, vn).
    pub gap_utility: Vec<Vec<f64>>,
    pub mlc: MlcParams,
    /// Lateral speed while executing a change, m/s.
    pub lane_shift_velocity: f64,
    /// Lead gap below which a DLC is even considered, metres.
    pub satisfied_distance: f64,
    /// Courtesy-merge critical-gap coefficients.
    pub courtesy: [f64; 4],
}

impl LaneChangeParams {
    pub fn from_manager(pm: &ParameterManager) -> CoreResult<Self> {
        let mut gap_models = Vec::with_capacity(8);
        for i in 0..8 {
            gap_models.push(pm.param_vec_exact(&format!("LC_GAP_MODELS_{i}"), 9)?);
        }
        let mut gap_utility = Vec::with_capacity(3);
        for i in 0..3 {
            gap_utility.push(pm.param_vec_exact(&format!("GAP_PARAM_{i}"), 6)?);
        }
        let m = pm.param_vec_exact("MLC_PARAMETERS", 5)?;
        Ok(Self {
            gap_models,
            gap_utility,
            mlc: MlcParams {
                feet_lowbound: m[0],
                feet_delta: m[1],
                lane_coeff: m[2],
                congest_coeff: m[3],
                lane_mintime: m[4],
            },
            lane_shift_velocity: pm.param_f64("lane_shift_velocity_cms")? / 100.0,
            satisfied_distance: pm.param_f64("dlc_satisfied_distance_m")?,
            courtesy: [1.82, 1.81, -0.153, 0.0951],
        })
    }
}

// ── Model ─────────────────────────────────────────────────────────────────────

pub struct LaneChangeModel {
    pub params: LaneChangeParams,
}

impl LaneChangeModel {
    pub fn new(params: LaneChangeParams) -> Self {
        Self { params }
    }

    pub fn from_manager(pm: &ParameterManager) -> CoreResult<Self> {
        Ok(Self::new(LaneChangeParams::from_manager(pm)?))
    }

    // ── Critical gap (Kazi) ───────────────────────────────────────────────

    /// Critical gap for parameter row `row`, remaining distance `dis` (m)
    /// and speed difference `dv` (m/s).
    ///
    /// `u = β0 + β1·remDistImpact + β2·dv + β3·min(dv,0) + β4·max(dv,0) + N(0,σ)`,
    /// clamped to `[e⁻⁴, e⁶]·scale`, floored at the row's β_min.
    pub fn critical_gap(&self, rng: &mut DriverRng, row: usize, dis: f64, dv: f64) -> f64 {
        let a = &self.params.gap_models[row];
        let (scale, beta_min, lambda) = (a[0], a[1], a[2]);
        let b = &a[3..8];

        // Only the mandatory rows feel the remaining distance.
        let rem_dist_impact = if row < 3 {
            0.0
        } else {
            1.0 - 1.0 / (1.0 + (lambda * dis).exp())
        };
        let dv_neg = dv.min(0.0);
        let dv_pos = dv.max(0.0);
        let gap = b[0] + b[1] * rem_dist_impact + b[2] * dv + b[3] * dv_neg + b[4] * dv_pos;

        let u = gap + rng.normal(0.0, a[8]);
        let cri_gap = if u < -4.0 {
            0.0183 * scale
        } else if u > 6.0 {
            403.4 * scale
        } else {
            scale * u.exp()
        };
        cri_gap.max(beta_min)
    }

    /// Gap acceptance against both adjacent lanes for the given base row
    /// (lead = `base`, lag = `base + 1`).
    pub fn gap_acceptance(
        &self,
        p: &DriverUpdateParams,
        rng: &mut DriverRng,
        base: usize,
    ) -> LaneSide {
        let sides = [
            (p.has_left_lane, p.neighbors.left_fwd, p.neighbors.left_back),
            (p.has_right_lane, p.neighbors.right_fwd, p.neighbors.right_back),
        ];

        let mut free = [false, false];
        for (i, &(has_lane, fwd, back)) in sides.iter().enumerate() {
            if !has_lane {
                continue;
            }
            // Absent neighbors leave an effectively unbounded gap.
            let (lead_dist, lead_vel) = if fwd.exists() {
                (fwd.distance, fwd.velocity)
            } else {
                (50.0, 50.0)
            };
            let (lag_dist, lag_vel) = if back.exists() {
                (back.distance, back.velocity)
            } else {
                (50.0, -50.0)
            };

            let v = p.perceived_velocity;
            let lead_ok =
                lead_dist > self.critical_gap(rng, base, p.dist_to_stop, lead_vel - v);
            let lag_ok =
                lag_dist > self.critical_gap(rng, base + 1, p.dist_to_stop, lag_vel - v);
            free[i] = lead_ok && lag_ok;
        }

        LaneSide {
            left: free[0],
            right: free[1],
        }
    }

    // ── Discretionary ─────────────────────────────────────────────────────

    fn side_lane_utility(&self, p: &DriverUpdateParams, is_left: bool) -> f64 {
        if is_left && !p.has_left_lane {
            return f64::MIN;
        }
        if !is_left && !p.has_right_lane {
            return f64::MIN;
        }
        if is_left {
            p.neighbors.left_fwd.distance
        } else {
            p.neighbors.right_fwd.distance
        }
    }

    /// DLC decision: change only when the current lead gap is unsatisfying
    /// and a side with more forward space accepts.
    pub fn decide_discretionary(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> LaneChangeSide {
        let free_lanes = self.gap_acceptance(p, rng, DLC_BASE);
        if !free_lanes.left && !free_lanes.right {
            return LaneChangeSide::Same;
        }

        let s = p.neighbors.fwd.distance;
        if s > self.params.satisfied_distance {
            return LaneChangeSide::Same;
        }

        let (tg_left, tg_right) = self.choose_target_gap(p, rng);

        let left_utility = self.side_lane_utility(p, true);
        let right_utility = self.side_lane_utility(p, false);
        let left = s < left_utility;
        let right = s < right_utility;

        if free_lanes.right_only() && right {
            return LaneChangeSide::Right;
        }
        if free_lanes.left_only() && left {
            return LaneChangeSide::Left;
        }
        if free_lanes.both() {
            // Both sides accept: take the roomier one.
            return if left_utility >= right_utility {
                LaneChangeSide::Left
            } else {
                LaneChangeSide::Right
            };
        }

        if left || right {
            p.target_gap = if left_utility > right_utility { tg_left } else { tg_right };
        }
        LaneChangeSide::Same
    }

    // ── Mandatory ─────────────────────────────────────────────────────────

    /// Probability of switching to mandatory mode, rising as the distance to
    /// the mandatory point shrinks: `exp(−d²/δ²)` with `d`, `δ` in feet.
    pub fn check_if_mandatory(&self, p: &mut DriverUpdateParams) -> f64 {
        if p.next_lane_index == p.curr_lane_index {
            p.dist_to_stop = crate::update_params::NO_STOP_AHEAD;
        }
        // One lane to cross, and a fixed mid-range congestion level; the
        // mesoscopic density feed is a collaborator outside the core.
        let num_lanes = 1.0;
        let congestion = 0.5;
        let dis = p.dist_to_stop * FEET_PER_METER - self.params.mlc.feet_lowbound;
        let mut delta =
            1.0 + self.params.mlc.lane_coeff * num_lanes + self.params.mlc.congest_coeff * congestion;
        delta *= self.params.mlc.feet_delta;
        if delta == 0.0 {
            1.0
        } else {
            (-dis * dis / (delta * delta)).exp()
        }
    }

    /// MLC decision toward `next_lane_index`; sets `is_waiting` when the
    /// needed side does not accept.
    fn decide_with_gaps(&self, p: &mut DriverUpdateParams, free_lanes: LaneSide) -> LaneChangeSide {
        let direction = p.next_lane_index as i64 - p.curr_lane_index as i64;
        if direction == 0 {
            return LaneChangeSide::Same;
        }
        if free_lanes.right && direction < 0 {
            p.is_waiting = false;
            LaneChangeSide::Right
        } else if free_lanes.left && direction > 0 {
            p.is_waiting = false;
            LaneChangeSide::Left
        } else {
            // Target side blocked: decelerate and wait for a usable gap.
            p.is_waiting = true;
            LaneChangeSide::Same
        }
    }

    pub fn decide_mandatory(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> LaneChangeSide {
        let free_lanes = self.gap_acceptance(p, rng, MLC_BASE);
        self.decide_with_gaps(p, free_lanes)
    }

    // ── Courtesy / forced merging ─────────────────────────────────────────

    /// The projected gap in the target lane exceeds the courtesy critical
    /// gap: the driver merges expecting the lag vehicle to yield.
    pub fn is_courtesy_merging(&self, p: &DriverUpdateParams) -> bool {
        let direction = p.next_lane_index as i64 - p.curr_lane_index as i64;
        let (fwd, back) = if direction > 0 {
            (p.neighbors.left_fwd, p.neighbors.left_back)
        } else {
            (p.neighbors.right_fwd, p.neighbors.right_back)
        };

        let big = |nv: NearestVehicle, sign: f64| {
            if nv.exists() {
                (nv.distance, nv.velocity, nv.acceleration)
            } else {
                (50.0, sign * 50.0, 50.0)
            }
        };
        let (dis_lead, v_lead, acc_lead) = big(fwd, 1.0);
        let (dis_lag, v_lag, acc_lag) = big(back, -1.0);

        let dt = p.elapsed_seconds;
        let gap = dis_lead + dis_lag + (v_lead - v_lag) * dt + 0.5 * (acc_lead - acc_lag) * dt * dt;

        let c = &self.params.courtesy;
        let dv = (v_lag - p.perceived_velocity).max(0.0);
        let critical_gap = (c[0] + c[1] * dv + c[3] * p.dist_to_stop / 100.0).exp();
        gap > critical_gap
    }

    /// Forced merging fires with a small constant probability per tick.
    pub fn is_forced_merging(&self, rng: &mut DriverRng) -> bool {
        rng.uniform() < 1.0 / (1.0 + (4.27_f64 + 1.25 - 5.43).exp())
    }

    pub fn decide_courtesy(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> LaneChangeSide {
        let free_lanes = self.gap_acceptance(p, rng, COURTESY_BASE);
        self.decide_with_gaps(p, free_lanes)
    }

    pub fn decide_forced(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> LaneChangeSide {
        let free_lanes = self.gap_acceptance(p, rng, FORCED_BASE);
        self.decide_with_gaps(p, free_lanes)
    }

    // ── Target gap choice ─────────────────────────────────────────────────

    /// Logit choice among {back, adjacent, forward} gaps per side, with
    /// utilities linear in gap size, gap velocity, and absent-neighbor
    /// dummies.  Returns the chosen gap for (left, right).
    pub fn choose_target_gap(
        &self,
        p: &DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> (TargetGap, TargetGap) {
        let n = &p.neighbors;
        // [side][slot]: back2, back, fwd, fwd2.
        let nv = [
            [n.left_back2, n.left_back, n.left_fwd, n.left_fwd2],
            [n.right_back2, n.right_back, n.right_fwd, n.right_fwd2],
        ];
        let has_lane = [p.has_left_lane, p.has_right_lane];

        let mut dis = [[50.0_f64; 4]; 2];
        let mut vel = [[0.0_f64; 4]; 2];
        for i in 0..2 {
            for j in 0..4 {
                if nv[i][j].exists() {
                    dis[i][j] = nv[i][j].distance;
                    vel[i][j] = nv[i][j].velocity;
                }
            }
        }

        let rand_num = rng.uniform();
        let u = &self.params.gap_utility;
        let mut utility = [[0.0_f64; 3]; 2];
        for i in 0..2 {
            // Back gap.
            utility[i][0] = u[0][0]
                + u[0][1] * dis[i][1]
                + u[0][2] * (dis[i][0] - dis[i][1])
                + u[0][3] * (vel[i][0] - vel[i][1])
                + if !nv[i][0].exists() { u[0][4] } else { 0.0 }
                + u[0][5] * rand_num;
            // Adjacent gap.
            utility[i][1] = u[1][0]
                + u[1][2] * (dis[i][1] + dis[i][2])
                + u[1][3] * (vel[i][1] - vel[i][2])
                + if !nv[i][1].exists() || !nv[i][2].exists() { u[1][4] } else { 0.0 }
                + u[1][5] * rand_num;
            // Forward gap.
            utility[i][2] = u[2][0]
                + u[2][1] * dis[i][2]
                + u[2][2] * (dis[i][3] - dis[i][2])
                + u[2][3] * (vel[i][2] - vel[i][3])
                + if !nv[i][3].exists() { u[2][4] } else { 0.0 }
                + u[2][5] * rand_num;
            if !has_lane[i] {
                utility[i] = [f64::MIN, f64::MIN, f64::MIN];
            }
        }

        let gaps = [
            [TargetGap::LeftBack, TargetGap::LeftAdj, TargetGap::LeftFwd],
            [TargetGap::RightBack, TargetGap::RightAdj, TargetGap::RightFwd],
        ];
        let draw = rng.uniform();
        let mut chosen = [TargetGap::Same, TargetGap::Same];
        for i in 0..2 {
            if !has_lane[i] {
                continue;
            }
            let exps: Vec<f64> = utility[i].iter().map(|&x| x.exp()).collect();
            let logsum: f64 = exps.iter().sum();
            if logsum <= 0.0 {
                continue;
            }
            let mut cum = 0.0;
            for j in 0..3 {
                cum += exps[j] / logsum;
                if draw < cum {
                    chosen[i] = gaps[i][j];
                    break;
                }
            }
        }
        (chosen[0], chosen[1])
    }

    // ── Top-level decision ────────────────────────────────────────────────

    /// Decide this tick's lateral action and return the lateral velocity
    /// (positive = left).  Zero while no change is wanted.
    ///
    /// Persistence: during the `cftimer` cool-down the previous decision is
    /// returned unchanged; a fresh non-`Same` decision arms the cool-down.
    pub fn make_lateral_decision(
        &self,
        p: &mut DriverUpdateParams,
        rng: &mut DriverRng,
    ) -> f64 {
        // Too close to the node to start a change.
        if p.dist_to_stop <= 3.0 {
            return 0.0;
        }

        if p.cftimer > f64::EPSILON {
            return self.shift_velocity(p.last_decision);
        }

        // DLC may escalate to MLC by the distance-based draw, to courtesy
        // merging when the projected gap tolerates it, or to forced merging.
        let rand_num = rng.uniform();
        let mand_check = self.check_if_mandatory(p);
        let mut mode = LaneChangeMode::Discretionary;
        if p.is_mlc || rand_num < mand_check {
            mode = LaneChangeMode::Mandatory;
        } else {
            p.dist_to_stop = 1_000.0; // no crucial point ahead
        }

        let decision = match mode {
            LaneChangeMode::Discretionary => self.decide_discretionary(p, rng),
            LaneChangeMode::Mandatory => {
                if self.is_courtesy_merging(p) {
                    self.decide_courtesy(p, rng)
                } else if self.is_forced_merging(rng) {
                    self.decide_forced(p, rng)
                } else {
                    self.decide_mandatory(p, rng)
                }
            }
        };

        p.last_change_mode = mode;
        p.last_decision = decision;
        if decision != LaneChangeSide::Same {
            p.cftimer = self.params.mlc.lane_mintime;
        }
        self.shift_velocity(decision)
    }

    #[inline]
    fn shift_velocity(&self, side: LaneChangeSide) -> f64 {
        match side {
            LaneChangeSide::Left => self.params.lane_shift_velocity,
            LaneChangeSide::Right => -self.params.lane_shift_velocity,
            LaneChangeSide::Same => 0.0,
        }
    }
}
