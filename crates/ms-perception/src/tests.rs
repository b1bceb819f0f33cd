//! Unit tests for ms-perception.

use ms_core::Millis;

use crate::delayed::FixedDelayed;
use crate::driver::{DriverPerception, Observation, TrafficColor, SignalObservation};
use crate::error::PerceptionError;

// ── FixedDelayed contract ─────────────────────────────────────────────────────

#[test]
fn sense_respects_delay() {
    let mut d = FixedDelayed::new(Millis(300));
    d.update(Millis(0)).unwrap();
    d.record(1);
    d.update(Millis(100)).unwrap();
    d.record(2);

    // At t=100 nothing has aged 300 ms yet.
    assert!(!d.can_sense());
    assert_eq!(d.sense(), None);

    // At t=300 the t=0 sample becomes visible.
    d.update(Millis(300)).unwrap();
    assert!(d.can_sense());
    assert_eq!(d.sense(), Some(&1));

    // At t=400 the t=100 sample is the freshest old-enough one.
    d.update(Millis(400)).unwrap();
    assert_eq!(d.sense(), Some(&2));
}

#[test]
fn sense_returns_freshest_eligible_not_newest() {
    let mut d = FixedDelayed::new(Millis(200));
    for t in [0u64, 100, 200, 300] {
        d.update(Millis(t)).unwrap();
        d.record(t);
    }
    // now=300, delay=200: eligible samples are t=0 and t=100; freshest is 100.
    assert_eq!(d.sense(), Some(&100));
}

#[test]
fn newest_expired_sample_is_retained() {
    let mut d = FixedDelayed::new(Millis(100));
    d.update(Millis(0)).unwrap();
    d.record(7);
    // Far past the horizon with no new samples: the last value must survive.
    d.update(Millis(10_000)).unwrap();
    assert_eq!(d.sense(), Some(&7));
    assert_eq!(d.len(), 1);
}

#[test]
fn pruning_keeps_buffer_bounded() {
    let mut d = FixedDelayed::new(Millis(100));
    for t in 0..50u64 {
        d.update(Millis(t * 10)).unwrap();
        d.record(t);
    }
    // Horizon is 100 ms = 10 samples at this rate (plus the retained edge).
    assert!(d.len() <= 12, "len = {}", d.len());
}

#[test]
fn time_regression_is_fatal() {
    let mut d = FixedDelayed::<i32>::new(Millis(100));
    d.update(Millis(500)).unwrap();
    let err = d.update(Millis(400)).unwrap_err();
    assert!(matches!(err, PerceptionError::TimeRegression { .. }));
}

#[test]
fn same_time_update_is_noop() {
    let mut d = FixedDelayed::<i32>::new(Millis(100));
    d.update(Millis(500)).unwrap();
    d.update(Millis(500)).unwrap();
}

#[test]
fn zero_delay_is_a_single_slot() {
    let mut d = FixedDelayed::new(Millis(0));
    d.update(Millis(0)).unwrap();
    assert!(!d.can_sense());
    d.record(1);
    assert_eq!(d.sense(), Some(&1));
    d.record(2);
    assert_eq!(d.sense(), Some(&2));
    assert_eq!(d.len(), 1);
}

#[test]
fn set_delay_is_clamped_to_max() {
    let mut d = FixedDelayed::<i32>::new(Millis(200));
    d.set_delay(Millis(5_000));
    assert_eq!(d.delay(), Millis(200));
}

#[test]
fn shorter_delay_sees_fresher_samples() {
    let mut d = FixedDelayed::new(Millis(400));
    for t in [0u64, 100, 200, 300, 400] {
        d.update(Millis(t)).unwrap();
        d.record(t);
    }
    assert_eq!(d.sense(), Some(&0)); // delay = max = 400
    d.set_delay(Millis(100));
    assert_eq!(d.sense(), Some(&300));
}

// ── DriverPerception bundle ───────────────────────────────────────────────────

#[test]
fn warm_up_falls_back_to_instantaneous() {
    let mut p = DriverPerception::new(Millis(500), Millis(500));
    let obs = Observation {
        velocity: 10.0,
        ..Observation::default()
    };
    let snap = p.update_and_sense(Millis(0), &obs).unwrap();
    assert_eq!(snap.velocity, 10.0);
}

#[test]
fn perceived_values_lag_reality() {
    let mut p = DriverPerception::new(Millis(200), Millis(200));
    for (t, v) in [(0u64, 5.0), (100, 6.0), (200, 7.0), (300, 8.0)] {
        let obs = Observation { velocity: v, ..Observation::default() };
        let snap = p.update_and_sense(Millis(t), &obs).unwrap();
        if t == 300 {
            // Sees the t=100 observation, two ticks behind reality.
            assert_eq!(snap.velocity, 6.0);
        }
    }
}

#[test]
fn signal_comes_back_as_perceived_type() {
    let mut p = DriverPerception::new(Millis(0), Millis(0));
    let obs = Observation {
        velocity: 3.0,
        signal: Some(SignalObservation { color: TrafficColor::Red, distance: 25.0 }),
        ..Observation::default()
    };
    let snap = p.update_and_sense(Millis(0), &obs).unwrap();
    let (color, dist) = snap.signal.unwrap();
    assert_eq!(color.0, TrafficColor::Red);
    assert_eq!(dist, 25.0);
}
