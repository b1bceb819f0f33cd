//! `RoadNetworkBuilder` — incremental construction, then freeze.
//!
//! Loaders speak in external 64-bit ids and may add entities in any order
//! that preserves referential integrity (parents before children is NOT
//! required — everything is resolved in `build()`).  An entity whose
//! reference target is absent is **dropped with a `log::warn!`** and the
//! network continues reduced; only malformed geometry inside an otherwise
//! well-referenced entity is treated the same way.  Invariant: `build()`
//! never fails — a network constructed from the same input twice has
//! identical entity counts and connectivity.

use std::collections::BTreeMap;

use log::warn;
use ms_core::{
    BusStopId, Centimeters, ConnectorId, LaneId, LinkId, Meters, MetersPerSec, NodeId, Seconds,
    SegmentId, TurningGroupId, TurningPathId,
};
use rstar::RTree;
use rustc_hash::FxHashMap;

use crate::entities::{
    BusStop, Lane, LaneConnector, Link, LinkType, Node, NodeType, RoadItem, RoadSegment,
    TurningConflict, TurningGroup, TurningPath,
};
use crate::geometry::{Point, PolyLine};
use crate::network::{NodeEntry, RoadNetwork};

// ── Raw (loader-facing) records ───────────────────────────────────────────────

pub struct RawNode {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub node_type: NodeType,
}

pub struct RawLink {
    pub id: u64,
    pub from_node: u64,
    pub to_node: u64,
    pub link_type: LinkType,
    pub category: u8,
    pub road_name: String,
}

pub struct RawSegment {
    pub id: u64,
    pub link: u64,
    pub sequence: u32,
    pub max_speed: MetersPerSec,
    pub polyline: Vec<Point>,
}

pub struct RawLane {
    pub id: u64,
    pub segment: u64,
    pub index: usize,
    pub pedestrian_only: bool,
    pub width: Meters,
    pub polyline: Vec<Point>,
}

pub struct RawConnector {
    pub from_lane: u64,
    pub to_lane: u64,
}

pub struct RawTurningGroup {
    pub id: u64,
    pub node: u64,
    pub from_link: u64,
    pub to_link: u64,
}

pub struct RawTurningPath {
    pub id: u64,
    pub group: u64,
    pub from_lane: u64,
    pub to_lane: u64,
    pub polyline: Vec<Point>,
}

pub struct RawConflict {
    pub first_turning: u64,
    pub second_turning: u64,
    pub priority: u8,
}

/// An obstacle to place on a segment at `offset` from its start.
pub struct RawObstacle {
    pub segment: u64,
    pub offset: Centimeters,
    pub item: RawObstacleKind,
}

pub enum RawObstacleKind {
    BusStop { id: u64, name: String, has_bay: bool },
    Crossing { length: Meters },
    Incident { speed_limit: MetersPerSec },
    StopPoint { dwell: Seconds },
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Accumulates raw records; [`build`](Self::build) resolves and freezes.
#[derive(Default)]
pub struct RoadNetworkBuilder {
    nodes: Vec<RawNode>,
    links: Vec<RawLink>,
    segments: Vec<RawSegment>,
    lanes: Vec<RawLane>,
    connectors: Vec<RawConnector>,
    groups: Vec<RawTurningGroup>,
    paths: Vec<RawTurningPath>,
    conflicts: Vec<RawConflict>,
    obstacles: Vec<RawObstacle>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, n: RawNode) {
        self.nodes.push(n);
    }

    pub fn add_link(&mut self, l: RawLink) {
        self.links.push(l);
    }

    pub fn add_segment(&mut self, s: RawSegment) {
        self.segments.push(s);
    }

    pub fn add_lane(&mut self, l: RawLane) {
        self.lanes.push(l);
    }

    pub fn add_connector(&mut self, c: RawConnector) {
        self.connectors.push(c);
    }

    pub fn add_turning_group(&mut self, g: RawTurningGroup) {
        self.groups.push(g);
    }

    pub fn add_turning_path(&mut self, p: RawTurningPath) {
        self.paths.push(p);
    }

    pub fn add_conflict(&mut self, c: RawConflict) {
        self.conflicts.push(c);
    }

    pub fn add_obstacle(&mut self, o: RawObstacle) {
        self.obstacles.push(o);
    }

    /// Resolve all references and freeze the network.
    ///
    /// Deterministic: arena order is insertion order of the surviving
    /// entities, so the same input always yields the same network.
    pub fn build(self) -> RoadNetwork {
        let mut net = RoadNetwork {
            nodes: Vec::new(),
            links: Vec::new(),
            segments: Vec::new(),
            lanes: Vec::new(),
            connectors: Vec::new(),
            turning_groups: Vec::new(),
            turning_paths: Vec::new(),
            conflicts: Vec::new(),
            bus_stops: Vec::new(),
            ext_nodes: FxHashMap::default(),
            ext_segments: FxHashMap::default(),
            spatial_idx: RTree::new(),
        };

        // ── Nodes ─────────────────────────────────────────────────────────
        let mut node_ids: FxHashMap<u64, NodeId> = FxHashMap::default();
        for raw in self.nodes {
            if node_ids.contains_key(&raw.id) {
                warn!("dropping duplicate node {}", raw.id);
                continue;
            }
            let id = NodeId(net.nodes.len() as u32);
            node_ids.insert(raw.id, id);
            net.nodes.push(Node {
                ext_id: raw.id,
                id,
                location: Point::new(raw.x, raw.y),
                node_type: raw.node_type,
                turning_groups: FxHashMap::default(),
            });
        }

        // ── Links ─────────────────────────────────────────────────────────
        let mut link_ids: FxHashMap<u64, LinkId> = FxHashMap::default();
        for raw in self.links {
            let (Some(&from), Some(&to)) =
                (node_ids.get(&raw.from_node), node_ids.get(&raw.to_node))
            else {
                warn!("dropping link {}: missing endpoint node", raw.id);
                continue;
            };
            let id = LinkId(net.links.len() as u32);
            link_ids.insert(raw.id, id);
            net.links.push(Link {
                ext_id: raw.id,
                id,
                from_node: from,
                to_node: to,
                link_type: raw.link_type,
                category: raw.category,
                road_name: raw.road_name,
                segments: Vec::new(),
            });
        }

        // ── Segments ──────────────────────────────────────────────────────
        let mut seg_ids: FxHashMap<u64, SegmentId> = FxHashMap::default();
        for raw in self.segments {
            let Some(&link) = link_ids.get(&raw.link) else {
                warn!("dropping segment {}: missing link {}", raw.id, raw.link);
                continue;
            };
            let polyline = match PolyLine::new(raw.polyline) {
                Ok(p) => p,
                Err(e) => {
                    warn!("dropping segment {}: {e}", raw.id);
                    continue;
                }
            };
            let id = SegmentId(net.segments.len() as u32);
            seg_ids.insert(raw.id, id);
            net.links[link.index()].segments.push(id);
            net.segments.push(RoadSegment {
                ext_id: raw.id,
                id,
                link,
                sequence: raw.sequence,
                lanes: Vec::new(),
                polyline,
                obstacles: BTreeMap::new(),
                max_speed: raw.max_speed,
            });
        }
        // Travel order within each link.
        for link in &mut net.links {
            let mut segs = std::mem::take(&mut link.segments);
            segs.sort_by_key(|&s| net.segments[s.index()].sequence);
            link.segments = segs;
        }

        // ── Lanes ─────────────────────────────────────────────────────────
        let mut lane_ids: FxHashMap<u64, LaneId> = FxHashMap::default();
        for raw in self.lanes {
            let Some(&segment) = seg_ids.get(&raw.segment) else {
                warn!("dropping lane {}: missing segment {}", raw.id, raw.segment);
                continue;
            };
            let polyline = match PolyLine::new(raw.polyline) {
                Ok(p) => p,
                Err(e) => {
                    warn!("dropping lane {}: {e}", raw.id);
                    continue;
                }
            };
            let id = LaneId(net.lanes.len() as u32);
            lane_ids.insert(raw.id, id);
            net.segments[segment.index()].lanes.push(id);
            net.lanes.push(Lane {
                ext_id: raw.id,
                id,
                segment,
                index: raw.index,
                polyline,
                pedestrian_only: raw.pedestrian_only,
                width: raw.width,
                connectors: Vec::new(),
            });
        }
        for seg in &mut net.segments {
            let mut lanes = std::mem::take(&mut seg.lanes);
            lanes.sort_by_key(|&l| net.lanes[l.index()].index);
            seg.lanes = lanes;
        }

        // ── Lane connectors ───────────────────────────────────────────────
        for raw in self.connectors {
            let (Some(&from), Some(&to)) =
                (lane_ids.get(&raw.from_lane), lane_ids.get(&raw.to_lane))
            else {
                warn!(
                    "dropping connector {} -> {}: missing lane",
                    raw.from_lane, raw.to_lane
                );
                continue;
            };
            let id = ConnectorId(net.connectors.len() as u32);
            net.lanes[from.index()].connectors.push(id);
            net.connectors.push(LaneConnector {
                id,
                from_lane: from,
                to_lane: to,
            });
        }

        // ── Turning groups ────────────────────────────────────────────────
        let mut group_ids: FxHashMap<u64, TurningGroupId> = FxHashMap::default();
        for raw in self.groups {
            let (Some(&node), Some(&from_link), Some(&to_link)) = (
                node_ids.get(&raw.node),
                link_ids.get(&raw.from_link),
                link_ids.get(&raw.to_link),
            ) else {
                warn!("dropping turning group {}: missing reference", raw.id);
                continue;
            };
            let id = TurningGroupId(net.turning_groups.len() as u32);
            group_ids.insert(raw.id, id);
            net.nodes[node.index()]
                .turning_groups
                .insert((from_link, to_link), id);
            net.turning_groups.push(TurningGroup {
                ext_id: raw.id,
                id,
                node,
                from_link,
                to_link,
                paths: FxHashMap::default(),
            });
        }

        // ── Turning paths ─────────────────────────────────────────────────
        let mut path_ids: FxHashMap<u64, TurningPathId> = FxHashMap::default();
        for raw in self.paths {
            let (Some(&group), Some(&from_lane), Some(&to_lane)) = (
                group_ids.get(&raw.group),
                lane_ids.get(&raw.from_lane),
                lane_ids.get(&raw.to_lane),
            ) else {
                warn!("dropping turning path {}: missing reference", raw.id);
                continue;
            };
            let polyline = match PolyLine::new(raw.polyline) {
                Ok(p) => p,
                Err(e) => {
                    warn!("dropping turning path {}: {e}", raw.id);
                    continue;
                }
            };
            let id = TurningPathId(net.turning_paths.len() as u32);
            path_ids.insert(raw.id, id);
            net.turning_groups[group.index()]
                .paths
                .insert((from_lane, to_lane), id);
            net.turning_paths.push(TurningPath {
                ext_id: raw.id,
                id,
                group,
                from_lane,
                to_lane,
                polyline,
                conflicts: FxHashMap::default(),
            });
        }

        // ── Conflicts (symmetric) ─────────────────────────────────────────
        for raw in self.conflicts {
            let (Some(&first), Some(&second)) = (
                path_ids.get(&raw.first_turning),
                path_ids.get(&raw.second_turning),
            ) else {
                warn!(
                    "dropping conflict {} / {}: missing turning path",
                    raw.first_turning, raw.second_turning
                );
                continue;
            };
            let idx = net.conflicts.len() as u32;
            net.conflicts.push(TurningConflict {
                first,
                second,
                priority: raw.priority,
            });
            net.turning_paths[first.index()].conflicts.insert(second, idx);
            net.turning_paths[second.index()].conflicts.insert(first, idx);
        }

        // ── Obstacles ─────────────────────────────────────────────────────
        for raw in self.obstacles {
            let Some(&segment) = seg_ids.get(&raw.segment) else {
                warn!("dropping obstacle on missing segment {}", raw.segment);
                continue;
            };
            let item = match raw.item {
                RawObstacleKind::BusStop { id: ext, name, has_bay } => {
                    let id = BusStopId(net.bus_stops.len() as u32);
                    net.bus_stops.push(BusStop {
                        ext_id: ext,
                        id,
                        segment,
                        offset: raw.offset,
                        name,
                        has_bay,
                    });
                    RoadItem::BusStop(id)
                }
                RawObstacleKind::Crossing { length } => RoadItem::Crossing { length },
                RawObstacleKind::Incident { speed_limit } => RoadItem::Incident { speed_limit },
                RawObstacleKind::StopPoint { dwell } => RoadItem::StopPoint { dwell },
            };
            net.segments[segment.index()]
                .obstacles
                .insert(raw.offset, item);
        }

        // ── External-id maps + spatial index ──────────────────────────────
        net.ext_nodes = node_ids;
        net.ext_segments = seg_ids;
        let entries: Vec<NodeEntry> = net
            .nodes
            .iter()
            .map(|n| NodeEntry {
                point: [n.location.x, n.location.y],
                id: n.id,
            })
            .collect();
        net.spatial_idx = RTree::bulk_load(entries);

        net
    }
}
