//! The frozen `RoadNetwork` and its lookup surface.

use ms_core::{
    BusStopId, LaneId, LinkId, NodeId, SegmentId, TurningGroupId, TurningPathId,
};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

use crate::entities::{
    BusStop, Lane, LaneConnector, Link, Node, RoadSegment, TurningConflict, TurningGroup,
    TurningPath,
};
use crate::geometry::Point;

// ── R-tree node entry ─────────────────────────────────────────────────────────

/// Entry stored in the spatial index: a 2-D point with its `NodeId`.
#[derive(Clone)]
pub(crate) struct NodeEntry {
    pub point: [f64; 2],
    pub id: NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Immutable geometry and topology, arena-stored.
///
/// All arenas are `pub` for direct indexed access on hot paths (ids are dense
/// arena positions).  Do not construct directly; use
/// [`RoadNetworkBuilder`](crate::builder::RoadNetworkBuilder), which resolves
/// external ids and enforces referential integrity.
pub struct RoadNetwork {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub segments: Vec<RoadSegment>,
    pub lanes: Vec<Lane>,
    pub connectors: Vec<LaneConnector>,
    pub turning_groups: Vec<TurningGroup>,
    pub turning_paths: Vec<TurningPath>,
    pub conflicts: Vec<TurningConflict>,
    pub bus_stops: Vec<BusStop>,

    /// External (loader) id → arena id, kept for demand and incident input.
    pub(crate) ext_nodes: FxHashMap<u64, NodeId>,
    pub(crate) ext_segments: FxHashMap<u64, SegmentId>,

    pub(crate) spatial_idx: RTree<NodeEntry>,
}

impl RoadNetwork {
    // ── Arena accessors ───────────────────────────────────────────────────

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.index()]
    }

    #[inline]
    pub fn segment(&self, id: SegmentId) -> &RoadSegment {
        &self.segments[id.index()]
    }

    #[inline]
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id.index()]
    }

    #[inline]
    pub fn turning_group(&self, id: TurningGroupId) -> &TurningGroup {
        &self.turning_groups[id.index()]
    }

    #[inline]
    pub fn turning_path(&self, id: TurningPathId) -> &TurningPath {
        &self.turning_paths[id.index()]
    }

    #[inline]
    pub fn bus_stop(&self, id: BusStopId) -> &BusStop {
        &self.bus_stops[id.index()]
    }

    // ── Topology lookups ──────────────────────────────────────────────────

    /// Lanes of `segment`, ordered by lane index.
    #[inline]
    pub fn lanes_of(&self, segment: SegmentId) -> &[LaneId] {
        &self.segment(segment).lanes
    }

    /// Lane at `index` within `segment`, if in range.
    #[inline]
    pub fn lane_at(&self, segment: SegmentId, index: usize) -> Option<LaneId> {
        self.segment(segment).lanes.get(index).copied()
    }

    /// Downstream lanes reachable from `lane` via same-link connectors.
    pub fn downstream_lanes(&self, lane: LaneId) -> impl Iterator<Item = LaneId> + '_ {
        self.lane(lane)
            .connectors
            .iter()
            .map(|&c| self.connectors[c.index()].to_lane)
    }

    /// Turning paths leaving `lane` into the intersection downstream.
    pub fn turning_paths_from(&self, lane: LaneId) -> impl Iterator<Item = &TurningPath> {
        self.turning_paths.iter().filter(move |tp| tp.from_lane == lane)
    }

    /// The turning path connecting two specific lanes, if one exists.
    pub fn turning_path_between(&self, from: LaneId, to: LaneId) -> Option<TurningPathId> {
        self.turning_paths
            .iter()
            .find(|tp| tp.from_lane == from && tp.to_lane == to)
            .map(|tp| tp.id)
    }

    /// Turning group for the (from link, to link) movement at `node`.
    pub fn turning_group_between(
        &self,
        node: NodeId,
        from_link: LinkId,
        to_link: LinkId,
    ) -> Option<TurningGroupId> {
        self.node(node).turning_groups.get(&(from_link, to_link)).copied()
    }

    /// The registered conflict between two turning paths, if any.
    ///
    /// Conflicts are symmetric; argument order does not matter.
    pub fn conflict_between(&self, a: TurningPathId, b: TurningPathId) -> Option<&TurningConflict> {
        self.turning_path(a)
            .conflicts
            .get(&b)
            .map(|&idx| &self.conflicts[idx as usize])
    }

    /// The node where `link` ends — the intersection a driver leaving the
    /// link's last segment crosses.
    #[inline]
    pub fn link_end_node(&self, link: LinkId) -> NodeId {
        self.link(link).to_node
    }

    /// Successor of `segment` within its own link, if any.
    pub fn next_segment_in_link(&self, segment: SegmentId) -> Option<SegmentId> {
        let seg = self.segment(segment);
        let link = self.link(seg.link);
        let pos = link.segments.iter().position(|&s| s == segment)?;
        link.segments.get(pos + 1).copied()
    }

    // ── External-id resolution ────────────────────────────────────────────

    /// Resolve an external loader node id.
    pub fn node_by_ext(&self, ext: u64) -> Option<NodeId> {
        self.ext_nodes.get(&ext).copied()
    }

    /// Resolve an external loader segment id.
    pub fn segment_by_ext(&self, ext: u64) -> Option<SegmentId> {
        self.ext_segments.get(&ext).copied()
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Nearest network node to `pos`, or `None` for an empty network.
    pub fn nearest_node(&self, pos: Point) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.x, pos.y])
            .map(|e| e.id)
    }

    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
