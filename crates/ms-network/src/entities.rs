//! Road-network entities.
//!
//! All structs here are plain data stored in `RoadNetwork` arenas; references
//! between entities are typed ids.  Every entity keeps the external 64-bit id
//! its loader assigned (`ext_id`) for log messages — internal code only ever
//! touches the dense arena ids.

use std::collections::BTreeMap;

use ms_core::{
    BusStopId, Centimeters, ConnectorId, LaneId, LinkId, Meters, MetersPerSec, NodeId, Seconds,
    SegmentId, TurningGroupId, TurningPathId,
};
use rustc_hash::FxHashMap;

use crate::geometry::{Point, PolyLine};

// ── Node ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum NodeType {
    #[default]
    Default,
    PriorityMerge,
    NonPriorityMerge,
    Signalized,
    Uninode,
}

impl NodeType {
    /// Merge nodes join links without an intersection region: a path crosses
    /// them segment-to-segment, never via a turning path.
    #[inline]
    pub fn is_merge(self) -> bool {
        matches!(self, NodeType::PriorityMerge | NodeType::NonPriorityMerge)
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub ext_id: u64,
    pub id: NodeId,
    pub location: Point,
    pub node_type: NodeType,
    /// Turning groups at this node, keyed by (from link, to link).
    pub turning_groups: FxHashMap<(LinkId, LinkId), TurningGroupId>,
}

// ── Link ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LinkType {
    #[default]
    Default,
    Expressway,
    Urban,
    Ramp,
    Roundabout,
    Access,
}

#[derive(Clone, Debug)]
pub struct Link {
    pub ext_id: u64,
    pub id: LinkId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub link_type: LinkType,
    /// Loader-defined category code, carried through untouched.
    pub category: u8,
    pub road_name: String,
    /// Segments in travel order.
    pub segments: Vec<SegmentId>,
}

// ── RoadSegment ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct RoadSegment {
    pub ext_id: u64,
    pub id: SegmentId,
    pub link: LinkId,
    /// Position of this segment within its parent link.
    pub sequence: u32,
    /// Lanes ordered by index (0 = rightmost in travel direction).
    pub lanes: Vec<LaneId>,
    /// Centre-line geometry.
    pub polyline: PolyLine,
    /// Road items keyed by their offset from the segment start.
    pub obstacles: BTreeMap<Centimeters, RoadItem>,
    pub max_speed: MetersPerSec,
}

impl RoadSegment {
    #[inline]
    pub fn length(&self) -> Meters {
        self.polyline.length()
    }

    /// Obstacles at offsets within `[from, to)`, in offset order.
    pub fn obstacles_in(
        &self,
        from: Centimeters,
        to: Centimeters,
    ) -> impl Iterator<Item = (Centimeters, &RoadItem)> {
        self.obstacles.range(from..to).map(|(&off, item)| (off, item))
    }
}

// ── Lane ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Lane {
    pub ext_id: u64,
    pub id: LaneId,
    pub segment: SegmentId,
    /// Index within the parent segment's lane list.
    pub index: usize,
    pub polyline: PolyLine,
    pub pedestrian_only: bool,
    pub width: Meters,
    /// Outgoing connectors to downstream lanes.
    pub connectors: Vec<ConnectorId>,
}

impl Lane {
    #[inline]
    pub fn length(&self) -> Meters {
        self.polyline.length()
    }
}

/// A lane-to-lane adjacency across a segment seam (same link) — distinct
/// from turning paths, which cross intersections.
#[derive(Clone, Debug)]
pub struct LaneConnector {
    pub id: ConnectorId,
    pub from_lane: LaneId,
    pub to_lane: LaneId,
}

// ── Turnings ──────────────────────────────────────────────────────────────────

/// All turning paths realizing one from-link → to-link movement at a node.
#[derive(Clone, Debug)]
pub struct TurningGroup {
    pub ext_id: u64,
    pub id: TurningGroupId,
    pub node: NodeId,
    pub from_link: LinkId,
    pub to_link: LinkId,
    /// Paths keyed by (from lane, to lane).
    pub paths: FxHashMap<(LaneId, LaneId), TurningPathId>,
}

/// One from-lane → to-lane polyline through an intersection.
#[derive(Clone, Debug)]
pub struct TurningPath {
    pub ext_id: u64,
    pub id: TurningPathId,
    pub group: TurningGroupId,
    pub from_lane: LaneId,
    pub to_lane: LaneId,
    pub polyline: PolyLine,
    /// Conflicting paths → index into the network's conflict arena.
    pub conflicts: FxHashMap<TurningPathId, u32>,
}

impl TurningPath {
    #[inline]
    pub fn length(&self) -> Meters {
        self.polyline.length()
    }
}

/// A pair of turning paths whose crossings must be serialized.
///
/// Symmetric: the conflict is registered on both paths.
#[derive(Copy, Clone, Debug)]
pub struct TurningConflict {
    pub first: TurningPathId,
    pub second: TurningPathId,
    /// Higher wins when the intersection manager orders same-tick requests.
    pub priority: u8,
}

// ── Road items ────────────────────────────────────────────────────────────────

/// An obstacle placed at an offset along a road segment.
#[derive(Clone, Debug)]
pub enum RoadItem {
    BusStop(BusStopId),
    Crossing { length: Meters },
    Incident { speed_limit: MetersPerSec },
    StopPoint { dwell: Seconds },
}

#[derive(Clone, Debug)]
pub struct BusStop {
    pub ext_id: u64,
    pub id: BusStopId,
    pub segment: SegmentId,
    pub offset: Centimeters,
    pub name: String,
    /// A bay lets the bus dwell off the travel lane.
    pub has_bay: bool,
}
