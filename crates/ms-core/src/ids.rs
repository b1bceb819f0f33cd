//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  The inner integer is `pub` to allow
//! direct indexing into arena `Vec`s via `id.0 as usize`, but callers should
//! prefer the `.index()` helper for clarity.
//!
//! Network loaders speak in external 64-bit identifiers (unique within their
//! entity type); the network builder maps those to these dense `u32` arena
//! indices once, at load time.  The external id is retained on each entity
//! for log messages.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[derive(serde::Serialize, serde::Deserialize)]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID" — equivalent to `u32::MAX`.
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a road-network node (intersection or link endpoint).
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a directed link (node-to-node bundle of segments).
    pub struct LinkId(u32);
}

typed_id! {
    /// Index of a road segment within the network arena.
    pub struct SegmentId(u32);
}

typed_id! {
    /// Index of a lane.  Lanes also carry an index *within* their segment;
    /// this id is the global arena position.
    pub struct LaneId(u32);
}

typed_id! {
    /// Index of a lane connector (lane → downstream lane at a segment seam).
    pub struct ConnectorId(u32);
}

typed_id! {
    /// Index of a turning group (all turning paths for one from-link →
    /// to-link movement at a node).
    pub struct TurningGroupId(u32);
}

typed_id! {
    /// Index of a turning path (one from-lane → to-lane polyline through a
    /// node).
    pub struct TurningPathId(u32);
}

typed_id! {
    /// Index of a bus stop.
    pub struct BusStopId(u32);
}

typed_id! {
    /// Index of a driver agent in the scheduler's arena.  Slots are stable
    /// for the lifetime of the run; reaped drivers leave tombstones.
    pub struct DriverId(u32);
}
