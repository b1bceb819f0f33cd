//! Deterministic per-driver and simulation-level RNG wrappers.
//!
//! # Determinism strategy
//!
//! Each driver gets its own independent `SmallRng` seeded by:
//!
//!   seed = global_seed XOR (driver_id * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive driver IDs uniformly across the seed space.
//! This means:
//!
//! - Drivers never share RNG state (no contention, no ordering dependency).
//! - Dispatching or reaping drivers does not disturb the streams of the
//!   others — runs are reproducible even as the population changes.
//! - All RNG calls are local to the owning thread; no synchronisation needed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

use crate::config::{ReactionTimeDist, ReactionTimeKind};
use crate::ids::DriverId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

// ── DriverRng ─────────────────────────────────────────────────────────────────

/// Per-driver deterministic RNG.
///
/// Create one per driver at dispatch; store in a parallel `Vec<DriverRng>`
/// alongside the driver arena.  The type is `!Sync` to prevent accidental
/// sharing across threads — each worker must hold its own slice.
pub struct DriverRng(SmallRng);

impl DriverRng {
    /// Seed deterministically from the run's global seed and a driver ID.
    pub fn new(global_seed: u64, driver: DriverId) -> Self {
        let seed = global_seed ^ (driver.0 as u64).wrapping_mul(MIXING_CONSTANT);
        DriverRng(SmallRng::seed_from_u64(seed))
    }

    /// Expose the inner `SmallRng` for use with `rand_distr` distribution
    /// types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// A uniform draw in [0, 1).
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.0.r#gen::<f64>()
    }

    /// A normal draw with the given mean and standard deviation.
    ///
    /// `stddev <= 0` degenerates to the mean, matching the behavioral-model
    /// convention that a zero-σ noise term is simply absent.
    pub fn normal(&mut self, mean: f64, stddev: f64) -> f64 {
        if stddev <= 0.0 {
            return mean;
        }
        // Normal::new only fails on non-finite stddev, checked above.
        let dist = Normal::new(mean, stddev).expect("finite stddev");
        dist.sample(&mut self.0)
    }

    /// Draw a perception delay in ms from the configured reaction-time
    /// distribution, clamped to `[0, max_ms]`.
    pub fn reaction_time_ms(&mut self, dist: &ReactionTimeDist, max_ms: u64) -> u64 {
        let raw = match dist.kind {
            ReactionTimeKind::Normal => self.normal(dist.mean_ms, dist.stddev_ms),
            ReactionTimeKind::Lognormal => {
                if dist.mean_ms <= 0.0 {
                    0.0
                } else {
                    // Parameterized so the underlying normal has the given
                    // mean/stddev in log space of the configured scale.
                    let mu = dist.mean_ms.ln();
                    let sigma = (dist.stddev_ms / dist.mean_ms).max(1e-9);
                    let dist = LogNormal::new(mu, sigma).expect("finite sigma");
                    dist.sample(&mut self.0)
                }
            }
        };
        (raw.max(0.0).round() as u64).min(max_ms)
    }
}

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Simulation-level RNG for global operations (demand jitter, exogenous
/// incidents, etc.).
///
/// Used only in single-threaded or explicitly synchronised contexts.  If you
/// need parallel randomness, give each worker its own `SimRng` seeded from
/// this one via [`SimRng::child`].
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }
}
