//! The per-driver perception bundle.
//!
//! One `DriverPerception` per driver owns a delayed buffer for each sensed
//! channel.  Every tick the driver pushes its instantaneous observations and
//! reads back the delayed view in a single call; the result is the only
//! perception input the behavioral models receive.

use ms_core::Millis;

use crate::delayed::FixedDelayed;
use crate::error::PerceptionResult;

// ── TrafficColor ──────────────────────────────────────────────────────────────

/// The *actual* state of a signal head.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TrafficColor {
    Red,
    Amber,
    Green,
}

/// A value as the driver perceives it — distinct at the type level from the
/// actual value so the two can never be mixed up in model code.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Perceived<T>(pub T);

// ── Observations ──────────────────────────────────────────────────────────────

/// Lead-vehicle quantities sensed in one tick (SI units).
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct LeadObservation {
    /// Gap to the lead vehicle's rear bumper, metres.
    pub distance: f64,
    /// Lead speed, m/s.
    pub velocity: f64,
    /// Lead acceleration, m/s².
    pub acceleration: f64,
}

/// Signal-head quantities sensed in one tick.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SignalObservation {
    pub color: TrafficColor,
    /// Distance to the stop line, metres.
    pub distance: f64,
}

/// Everything a driver senses in one tick, already normalized to SI.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Observation {
    /// Own forward speed, m/s.
    pub velocity: f64,
    /// Own forward acceleration, m/s².
    pub acceleration: f64,
    pub lead: Option<LeadObservation>,
    pub signal: Option<SignalObservation>,
}

/// The delayed view handed to the behavioral models.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct PerceivedSnapshot {
    pub velocity: f64,
    pub acceleration: f64,
    pub lead: Option<LeadObservation>,
    pub signal: Option<(Perceived<TrafficColor>, f64)>,
}

// ── DriverPerception ──────────────────────────────────────────────────────────

/// All delayed channels one driver owns.
///
/// The channels share one clock; `update_and_sense` is the only entry point
/// so they can never drift apart.
pub struct DriverPerception {
    velocity: FixedDelayed<f64>,
    acceleration: FixedDelayed<f64>,
    lead: FixedDelayed<Option<LeadObservation>>,
    signal: FixedDelayed<Option<SignalObservation>>,
}

impl DriverPerception {
    /// `delay` is this driver's reaction time; `max_delay` bounds any later
    /// [`set_delay`](Self::set_delay) call.
    pub fn new(max_delay: Millis, delay: Millis) -> Self {
        let mut p = Self {
            velocity: FixedDelayed::new(max_delay),
            acceleration: FixedDelayed::new(max_delay),
            lead: FixedDelayed::new(max_delay),
            signal: FixedDelayed::new(max_delay),
        };
        p.set_delay(delay);
        p
    }

    pub fn set_delay(&mut self, delay: Millis) {
        self.velocity.set_delay(delay);
        self.acceleration.set_delay(delay);
        self.lead.set_delay(delay);
        self.signal.set_delay(delay);
    }

    /// Push this tick's observations, advance the shared clock, and read the
    /// delayed view back.
    ///
    /// During warm-up (before `delay` has elapsed) the snapshot falls back to
    /// the *instantaneous* observation — a newly dispatched driver reacts to
    /// what is in front of it rather than to nothing.
    pub fn update_and_sense(
        &mut self,
        now: Millis,
        obs: &Observation,
    ) -> PerceptionResult<PerceivedSnapshot> {
        self.velocity.update(now)?;
        self.acceleration.update(now)?;
        self.lead.update(now)?;
        self.signal.update(now)?;

        self.velocity.record(obs.velocity);
        self.acceleration.record(obs.acceleration);
        self.lead.record(obs.lead);
        self.signal.record(obs.signal);

        Ok(PerceivedSnapshot {
            velocity: self.velocity.sense().copied().unwrap_or(obs.velocity),
            acceleration: self
                .acceleration
                .sense()
                .copied()
                .unwrap_or(obs.acceleration),
            lead: self.lead.sense().copied().unwrap_or(obs.lead),
            signal: self
                .signal
                .sense()
                .copied()
                .unwrap_or(obs.signal)
                .map(|s| (Perceived(s.color), s.distance)),
        })
    }
}
