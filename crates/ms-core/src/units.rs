//! Strongly-typed scalar units.
//!
//! The original MITSIM formulation mixes centimetres and metres (and ms and
//! seconds) freely; every such crossing here is an explicit conversion.
//! Network geometry and vehicle dimensions are stored in the unit their
//! sources use (`Centimeters` for vehicle lengths, `Meters` for polylines);
//! the behavioral models work in SI (`Meters`, `Seconds`, m/s, m/s²) after
//! the perception boundary normalizes everything once.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Generate a `Copy` f64 newtype with ordered comparison and basic arithmetic.
macro_rules! scalar_unit {
    ($(#[$attr:meta])* $vis:vis struct $name:ident(f64), suffix $suffix:literal;) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
        #[derive(serde::Serialize, serde::Deserialize)]
        $vis struct $name(pub f64);

        impl $name {
            pub const ZERO: $name = $name(0.0);

            #[inline]
            pub fn max(self, other: $name) -> $name {
                $name(self.0.max(other.0))
            }

            #[inline]
            pub fn min(self, other: $name) -> $name {
                $name(self.0.min(other.0))
            }

            #[inline]
            pub fn abs(self) -> $name {
                $name(self.0.abs())
            }
        }

        impl Add for $name {
            type Output = $name;
            #[inline]
            fn add(self, rhs: $name) -> $name { $name(self.0 + rhs.0) }
        }

        impl Sub for $name {
            type Output = $name;
            #[inline]
            fn sub(self, rhs: $name) -> $name { $name(self.0 - rhs.0) }
        }

        impl AddAssign for $name {
            #[inline]
            fn add_assign(&mut self, rhs: $name) { self.0 += rhs.0; }
        }

        impl SubAssign for $name {
            #[inline]
            fn sub_assign(&mut self, rhs: $name) { self.0 -= rhs.0; }
        }

        impl Mul<f64> for $name {
            type Output = $name;
            #[inline]
            fn mul(self, rhs: f64) -> $name { $name(self.0 * rhs) }
        }

        impl Div<f64> for $name {
            type Output = $name;
            #[inline]
            fn div(self, rhs: f64) -> $name { $name(self.0 / rhs) }
        }

        impl Neg for $name {
            type Output = $name;
            #[inline]
            fn neg(self) -> $name { $name(-self.0) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.3}{}", self.0, $suffix)
            }
        }
    };
}

scalar_unit! {
    /// Distance in metres.
    pub struct Meters(f64), suffix " m";
}

scalar_unit! {
    /// Duration in seconds.
    pub struct Seconds(f64), suffix " s";
}

scalar_unit! {
    /// Speed in metres per second.
    pub struct MetersPerSec(f64), suffix " m/s";
}

scalar_unit! {
    /// Acceleration in metres per second squared.
    pub struct MetersPerSec2(f64), suffix " m/s²";
}

// ── Centimeters ───────────────────────────────────────────────────────────────

/// Distance in whole centimetres — the unit vehicle dimensions and segment
/// obstacle offsets are specified in.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Centimeters(pub i64);

impl Centimeters {
    pub const ZERO: Centimeters = Centimeters(0);

    #[inline]
    pub fn to_meters(self) -> Meters {
        Meters(self.0 as f64 / 100.0)
    }
}

impl Meters {
    #[inline]
    pub fn to_centimeters(self) -> Centimeters {
        Centimeters((self.0 * 100.0).round() as i64)
    }
}

impl Add for Centimeters {
    type Output = Centimeters;
    #[inline]
    fn add(self, rhs: Centimeters) -> Centimeters {
        Centimeters(self.0 + rhs.0)
    }
}

impl Sub for Centimeters {
    type Output = Centimeters;
    #[inline]
    fn sub(self, rhs: Centimeters) -> Centimeters {
        Centimeters(self.0 - rhs.0)
    }
}

impl fmt::Display for Centimeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cm", self.0)
    }
}

// ── Millis ────────────────────────────────────────────────────────────────────

/// Duration in whole milliseconds — the unit the tick clock and the
/// perception delay buffers count in.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    #[inline]
    pub fn to_seconds(self) -> Seconds {
        Seconds(self.0 as f64 / 1_000.0)
    }
}

impl Seconds {
    #[inline]
    pub fn to_millis(self) -> Millis {
        Millis((self.0 * 1_000.0).round().max(0.0) as u64)
    }
}

impl Add for Millis {
    type Output = Millis;
    #[inline]
    fn add(self, rhs: Millis) -> Millis {
        Millis(self.0 + rhs.0)
    }
}

impl Sub for Millis {
    type Output = Millis;
    #[inline]
    fn sub(self, rhs: Millis) -> Millis {
        Millis(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

// ── Cross-unit arithmetic ─────────────────────────────────────────────────────

impl Div<Seconds> for Meters {
    type Output = MetersPerSec;
    #[inline]
    fn div(self, rhs: Seconds) -> MetersPerSec {
        MetersPerSec(self.0 / rhs.0)
    }
}

impl Mul<Seconds> for MetersPerSec {
    type Output = Meters;
    #[inline]
    fn mul(self, rhs: Seconds) -> Meters {
        Meters(self.0 * rhs.0)
    }
}

impl Mul<Seconds> for MetersPerSec2 {
    type Output = MetersPerSec;
    #[inline]
    fn mul(self, rhs: Seconds) -> MetersPerSec {
        MetersPerSec(self.0 * rhs.0)
    }
}
