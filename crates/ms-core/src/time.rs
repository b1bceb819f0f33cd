//! Simulation time model.
//!
//! # Design
//!
//! Time is a monotonically increasing `Tick` counter; the mapping to
//! milliseconds is held in `SimClock`:
//!
//!   now_ms = tick * base_gran_ms
//!
//! Using an integer tick as the canonical time unit keeps all scheduler
//! arithmetic exact (no floating-point drift) and comparisons O(1).  The
//! master granularity `base_gran_ms` is typically 100 ms for second-by-second
//! vehicle trajectories; coarser agent kinds run every N base ticks.

use std::fmt;

use crate::units::{Millis, Seconds};

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
///
/// Stored as `u64`: at 100 ms per tick a u64 lasts ~58 billion years, far
/// longer than any conceivable run.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0 - earlier.0
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between tick counts and simulated milliseconds.
///
/// `SimClock` is cheap to copy and intentionally holds no heap data.
#[derive(Clone, Debug)]
pub struct SimClock {
    /// Milliseconds per base tick.  Must be ≥ 1.
    pub base_gran_ms: u32,
    /// The current tick — advanced by [`SimClock::advance`] each iteration.
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(base_gran_ms: u32) -> Self {
        Self {
            base_gran_ms,
            current_tick: Tick::ZERO,
        }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Simulated milliseconds elapsed since tick 0.
    #[inline]
    pub fn now_ms(&self) -> Millis {
        Millis(self.current_tick.0 * self.base_gran_ms as u64)
    }

    /// Simulated seconds elapsed since tick 0.
    #[inline]
    pub fn now_secs(&self) -> Seconds {
        self.now_ms().to_seconds()
    }

    /// Duration of one base tick.
    #[inline]
    pub fn tick_secs(&self) -> Seconds {
        Seconds(self.base_gran_ms as f64 / 1_000.0)
    }

    /// The first tick at or after `ms` (rounds up — an agent is never early).
    #[inline]
    pub fn tick_at(&self, ms: Millis) -> Tick {
        Tick(ms.0.div_ceil(self.base_gran_ms as u64))
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.current_tick, self.now_ms())
    }
}
