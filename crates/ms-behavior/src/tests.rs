//! Unit tests for the behavioral models.

use ms_core::{DriverId, DriverRng, ParameterManager};
use ms_perception::TrafficColor;

use crate::lateral::LaneChangeModel;
use crate::longitudinal::{calc_headway, CarFollowingModel};
use crate::types::{LaneChangeSide, NearestVehicle, StopPointState};
use crate::update_params::DriverUpdateParams;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn rng() -> DriverRng {
    DriverRng::new(42, DriverId(0))
}

/// Parameter set with all stochastic terms zeroed so rates are exact.
fn quiet_manager() -> ParameterManager {
    let mut pm = ParameterManager::with_defaults();
    pm.set("max_acc_car1", "2.0 2.0 2.0 2.0 2.0");
    pm.set("normal_deceleration_car1", "2.0 2.0 2.0 2.0 2.0");
    pm.set("max_deceleration_car1", "8.0 8.0 8.0 8.0 8.0");
    pm.set("max_acceleration_scale", "1.0");
    pm.set("cf_param_accelerating", "0.0400 0.7220 0.2420 0.6820 0.6000 0.0");
    pm.set("cf_param_decelerating", "-0.0418 0.0000 0.1510 0.6840 0.6800 0.0");
    for i in 0..8 {
        // Zero the stddev column of each gap row.
        let base = pm.raw(&format!("LC_GAP_MODELS_{i}")).unwrap().to_owned();
        let mut cols: Vec<String> = base
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();
        cols[8] = "0.0".into();
        pm.set(&format!("LC_GAP_MODELS_{i}"), &cols.join(" "));
    }
    pm
}

fn cf_model() -> CarFollowingModel {
    CarFollowingModel::from_manager(&quiet_manager()).unwrap()
}

fn lc_model() -> LaneChangeModel {
    LaneChangeModel::from_manager(&quiet_manager()).unwrap()
}

fn base_params() -> DriverUpdateParams {
    DriverUpdateParams {
        elapsed_seconds: 0.1,
        desired_speed: 15.0,
        max_lane_speed: 20.0,
        perceived_velocity: 10.0,
        lane_count: 2,
        ..DriverUpdateParams::default()
    }
}

fn leader(distance: f64, velocity: f64) -> NearestVehicle {
    NearestVehicle {
        driver: Some(DriverId(99)),
        distance,
        velocity,
        acceleration: 0.0,
    }
}

// ── Headway ───────────────────────────────────────────────────────────────────

#[test]
fn headway_formula() {
    // h = 2s / (v + v + dt*a): 2*20 / (10+10+0.1*2) = 40/20.2
    let h = calc_headway(20.0, 10.0, 0.1, 2.0);
    assert!((h - 40.0 / 20.2).abs() < 1e-12);
}

#[test]
fn headway_at_standstill_is_huge() {
    assert!(calc_headway(20.0, 0.0, 0.1, 2.0) > 1e6);
}

// ── Longitudinal regimes ──────────────────────────────────────────────────────

#[test]
fn no_leader_free_flows_up_to_desired_speed() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    // Below desired speed: full acceleration.
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(acc, 2.0);

    // Above desired speed: no acceleration.
    p.perceived_velocity = 16.0;
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(acc, 0.0);
}

#[test]
fn close_slow_leader_forces_deceleration() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    // Leader 4 m ahead at 2 m/s while we do 10 m/s: headway well under the
    // lower buffer → emergency regime.
    p.neighbors.fwd = leader(4.0, 2.0);
    p.perceived_dist_to_lead = 4.0;
    p.perceived_lead_velocity = 2.0;
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    assert!(acc < -2.0, "expected hard braking, got {acc}");
    assert!(acc >= p.max_deceleration, "bounded by max deceleration");
}

#[test]
fn mid_band_leader_uses_car_following_law() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    // Gap chosen so headway lands between the buffers (0.8, 1.6) s:
    // h = 2s/20.2 → s ∈ (8.1, 16.2).
    p.neighbors.fwd = leader(12.0, 8.0);
    p.perceived_dist_to_lead = 12.0;
    p.perceived_lead_velocity = 8.0;
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    // Own speed exceeds the leader's → decelerating row (negative alpha).
    assert!(acc < 0.0, "closing on a slower leader must decelerate, got {acc}");
}

#[test]
fn far_leader_is_effectively_free_flow() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    p.neighbors.fwd = leader(400.0, 1.0);
    p.perceived_dist_to_lead = 400.0;
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(acc, 2.0);
}

#[test]
fn decision_is_bounded_by_speed_indexed_envelope() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    p.neighbors.fwd = leader(0.5, 0.0);
    p.perceived_dist_to_lead = 0.5;
    p.is_already_started = true;
    p.is_before_intersection = true;
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    assert!(acc >= p.max_deceleration && acc <= p.max_acceleration);
}

// ── brake_to_stop ─────────────────────────────────────────────────────────────

#[test]
fn brake_to_stop_is_simple_kinematics_when_binding() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    // Populate the per-tick bounds first.
    m.make_accelerating_decision(&mut p, &mut r);
    // v = 10 m/s, 25 m to the line: -v²/2d = -2.0, at least normal dec.
    let acc = m.brake_to_stop(&p, 25.0);
    assert!((acc - (-2.0)).abs() < 1e-9);
}

#[test]
fn brake_to_stop_is_a_loose_ceiling_when_stop_is_far() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    m.make_accelerating_decision(&mut p, &mut r);
    // 50 m out, a comfortable stop is still possible after accelerating
    // this tick — the constraint is not binding.
    let acc = m.brake_to_stop(&p, 50.0);
    assert!(acc > 0.0, "expected a non-binding ceiling, got {acc}");
}

#[test]
fn brake_to_stop_at_line_dumps_speed() {
    let m = cf_model();
    let mut p = base_params();
    let mut r = rng();
    m.make_accelerating_decision(&mut p, &mut r);
    let acc = m.brake_to_stop(&p, 0.0);
    assert!((acc - (-100.0)).abs() < 1e-9); // -v/dt = -10/0.1
}

// ── Signal response ───────────────────────────────────────────────────────────

#[test]
fn red_signal_brakes_green_does_not() {
    let m = cf_model();
    let mut r = rng();

    let mut p = base_params();
    p.perceived_signal = Some((TrafficColor::Red, 25.0));
    let red_acc = m.make_accelerating_decision(&mut p, &mut r);
    // -v²/2d = -100/50 = -2.0
    assert!(red_acc <= -2.0 + 1e-9, "red must brake, got {red_acc}");

    let mut p = base_params();
    p.perceived_signal = Some((TrafficColor::Green, 25.0));
    let green_acc = m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(green_acc, 2.0);
}

#[test]
fn amber_brakes_only_when_stop_is_comfortable() {
    let m = cf_model();
    let mut r = rng();

    // Comfortable stop available: dist/v = 20/10 = 2 s > 1 s headway → brake.
    let mut p = base_params();
    p.perceived_signal = Some((TrafficColor::Amber, 20.0));
    let far = m.make_accelerating_decision(&mut p, &mut r);
    assert!(far < 0.0, "expected braking, got {far}");

    // Practically at the line: 5/10 = 0.5 s < 1 s → run the amber.
    let mut p = base_params();
    p.perceived_signal = Some((TrafficColor::Amber, 5.0));
    let near = m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(near, 2.0);
}

// ── Stop points ───────────────────────────────────────────────────────────────

#[test]
fn stop_point_machine_walks_through_dwell() {
    let m = cf_model();
    let mut r = rng();
    let mut p = base_params();
    p.stop_state = StopPointState::Approaching;
    p.stop_dwell_sec = 10.0;

    // Far away: no effect yet.
    p.dist_to_stop_point = 200.0;
    m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(p.stop_state, StopPointState::Approaching);

    // Within perception range: switches to Close.
    p.dist_to_stop_point = 45.0;
    m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(p.stop_state, StopPointState::Close);

    // Close enough that the stop is binding: brakes.
    p.dist_to_stop_point = 20.0;
    let acc = m.make_accelerating_decision(&mut p, &mut r);
    assert!(acc < 0.0, "expected braking toward the stop point, got {acc}");

    // Crawled up to the point: arrives...
    p.dist_to_stop_point = 1.0;
    p.perceived_velocity = 0.05;
    m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(p.stop_state, StopPointState::JustArrived);

    // ...and starts the dwell.
    m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(p.stop_state, StopPointState::Waiting);

    // Still inside the dwell at +5 s.
    p.now_sec = 5.0;
    m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(p.stop_state, StopPointState::Waiting);

    // Dwell over at +10 s: released.
    p.now_sec = 10.0;
    m.make_accelerating_decision(&mut p, &mut r);
    assert_eq!(p.stop_state, StopPointState::Leaving);
}

// ── Critical gap / gap acceptance ─────────────────────────────────────────────

#[test]
fn critical_gap_clamps_to_exponent_window() {
    let m = lc_model();
    let mut r = rng();
    // Huge positive dv with the DLC lag row (beta3 > 0) drives u above 6.
    let high = m.critical_gap(&mut r, 1, 0.0, 1e6);
    assert!((high - 403.4).abs() < 1e-9);
    // Huge negative dv drives u below −4.
    let low = m.critical_gap(&mut r, 1, 0.0, -1e6);
    assert!((low - 0.0183).abs() < 1e-9);
}

#[test]
fn empty_adjacent_lane_accepts() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    p.has_right_lane = false;
    let side = m.gap_acceptance(&p, &mut r, 0);
    assert!(side.left, "clear lane should accept");
    assert!(!side.right, "absent lane never accepts");
}

#[test]
fn tailgater_blocks_the_gap() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    // Lag vehicle 0.5 m behind closing fast.
    p.neighbors.left_back = NearestVehicle {
        driver: Some(DriverId(7)),
        distance: 0.5,
        velocity: 20.0,
        acceleration: 0.0,
    };
    let side = m.gap_acceptance(&p, &mut r, 0);
    assert!(!side.left);
}

// ── DLC / MLC decisions ───────────────────────────────────────────────────────

#[test]
fn dlc_changes_toward_clear_lane_when_lead_is_slow() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    p.neighbors.fwd = leader(10.0, 5.0); // unsatisfying lead gap (< 20 m)
    let decision = m.decide_discretionary(&mut p, &mut r);
    assert_eq!(decision, LaneChangeSide::Left);
}

#[test]
fn dlc_stays_when_satisfied() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    p.neighbors.fwd = leader(100.0, 15.0);
    let decision = m.decide_discretionary(&mut p, &mut r);
    assert_eq!(decision, LaneChangeSide::Same);
}

#[test]
fn mlc_moves_toward_target_lane() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    p.curr_lane_index = 0;
    p.next_lane_index = 1; // higher index = left
    let decision = m.decide_mandatory(&mut p, &mut r);
    assert_eq!(decision, LaneChangeSide::Left);
    assert!(!p.is_waiting);
}

#[test]
fn blocked_mlc_sets_waiting() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    p.curr_lane_index = 0;
    p.next_lane_index = 1;
    // Block the left lane solidly ahead and behind.
    p.neighbors.left_fwd = leader(0.5, 0.0);
    p.neighbors.left_back = NearestVehicle {
        driver: Some(DriverId(8)),
        distance: 0.5,
        velocity: 20.0,
        acceleration: 0.0,
    };
    let decision = m.decide_mandatory(&mut p, &mut r);
    assert_eq!(decision, LaneChangeSide::Same);
    assert!(p.is_waiting);
}

// ── Top-level lateral decision ────────────────────────────────────────────────

#[test]
fn cooldown_repeats_last_decision() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.cftimer = 2.0;
    p.last_decision = LaneChangeSide::Left;
    let v = m.make_lateral_decision(&mut p, &mut r);
    assert!(v > 0.0, "cool-down must keep the committed direction");
}

#[test]
fn no_change_near_the_node() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.dist_to_stop = 2.0;
    p.cftimer = 0.0;
    assert_eq!(m.make_lateral_decision(&mut p, &mut r), 0.0);
}

#[test]
fn fresh_change_arms_the_cooldown() {
    let m = lc_model();
    let mut r = rng();
    let mut p = base_params();
    p.has_left_lane = true;
    p.curr_lane_index = 0;
    p.next_lane_index = 1;
    p.is_mlc = true; // force mandatory mode
    let v = m.make_lateral_decision(&mut p, &mut r);
    if v != 0.0 {
        assert!(p.cftimer > 0.0);
    }
}
