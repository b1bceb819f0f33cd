//! Top-level simulation configuration.
//!
//! Loaded from a JSON file by the application crate and validated once at
//! startup; every violation is a fatal [`CoreError::Config`].

use crate::error::{CoreError, CoreResult};
use crate::time::SimClock;

// ── MutexStrategy ─────────────────────────────────────────────────────────────

/// How double-buffered observables are protected.
///
/// `Buffered` is the default: two slots with a flip after the update barrier;
/// readers never lock.  `Locked` trades reader latency for lower memory and
/// is useful when observables are large.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutexStrategy {
    Locked,
    #[default]
    Buffered,
}

// ── Reaction time ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionTimeKind {
    Normal,
    Lognormal,
}

/// Distribution the per-driver perception delay is drawn from, in ms.
#[derive(Copy, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ReactionTimeDist {
    pub kind:      ReactionTimeKind,
    pub mean_ms:   f64,
    pub stddev_ms: f64,
}

impl Default for ReactionTimeDist {
    fn default() -> Self {
        Self {
            kind:      ReactionTimeKind::Normal,
            mean_ms:   500.0,
            stddev_ms: 100.0,
        }
    }
}

// ── Granularities ─────────────────────────────────────────────────────────────

/// Update granularities of the coarser agent kinds, in base ticks.
///
/// Each must divide `total_ticks` evenly so the last tick of the run is a
/// full cycle for every kind.
#[derive(Copy, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Granularities {
    pub person_ticks:        u32,
    pub signal_ticks:        u32,
    pub communication_ticks: u32,
}

impl Default for Granularities {
    fn default() -> Self {
        Self {
            person_ticks:        1,
            signal_ticks:        1,
            communication_ticks: 1,
        }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master tick length in milliseconds.  Must be ≥ 1.
    pub base_gran_ms: u32,

    /// Total base ticks to simulate.
    pub total_ticks: u64,

    /// Coarser update granularities (person / signal / communication).
    pub granularities: Granularities,

    /// Master RNG seed.  The same seed always produces identical results
    /// (for a fixed worker count).
    pub seed: u64,

    /// Worker thread count for the parallel update phase.  `None` uses all
    /// logical cores.
    pub num_threads: Option<usize>,

    /// Snapshot observers fire every N ticks.  0 disables snapshots.
    pub output_interval_ticks: u64,

    /// Double-buffer protection strategy for observables.
    pub mutex_strategy: MutexStrategy,

    /// Per-driver perception delay distribution.
    pub reaction_time: ReactionTimeDist,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            base_gran_ms:          100,
            total_ticks:           0,
            granularities:         Granularities::default(),
            seed:                  42,
            num_threads:           None,
            output_interval_ticks: 0,
            mutex_strategy:        MutexStrategy::default(),
            reaction_time:         ReactionTimeDist::default(),
        }
    }
}

impl SimConfig {
    /// The tick at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> crate::time::Tick {
        crate::time::Tick(self.total_ticks)
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.base_gran_ms)
    }

    /// Validate the configuration.  Fatal at startup on any violation.
    pub fn validate(&self) -> CoreResult<()> {
        if self.base_gran_ms < 1 {
            return Err(CoreError::Config("base_gran_ms must be >= 1".into()));
        }
        if self.total_ticks == 0 {
            return Err(CoreError::Config("total_ticks must be > 0".into()));
        }
        for (name, g) in [
            ("person", self.granularities.person_ticks),
            ("signal", self.granularities.signal_ticks),
            ("communication", self.granularities.communication_ticks),
        ] {
            if g == 0 {
                return Err(CoreError::Config(format!(
                    "{name} granularity must be >= 1 tick"
                )));
            }
            if !self.total_ticks.is_multiple_of(g as u64) {
                return Err(CoreError::Config(format!(
                    "{name} granularity {g} does not divide total_ticks {} evenly",
                    self.total_ticks
                )));
            }
        }
        if self.reaction_time.mean_ms < 0.0 || self.reaction_time.stddev_ms < 0.0 {
            return Err(CoreError::Config(
                "reaction time mean/stddev must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
