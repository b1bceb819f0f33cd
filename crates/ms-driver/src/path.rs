//! `PathMover` — a stateful cursor over a precomputed segment sequence.
//!
//! The mover tracks which segment, which polyline edge, and how far into
//! that edge the vehicle is, plus whether it is currently inside an
//! intersection (on a turning path between two links).  Exactly one of the
//! two holds at any time: on a segment, `dist_along_polyline ∈ [0, length]`;
//! in an intersection, progress is measured along the turning polyline.
//!
//! Segment seams within a link (and seams across merge nodes) are crossed
//! directly; a seam onto a new link across any other node enters the
//! intersection, and the driver's intersection model decides when to call
//! [`PathMover::leave_intersection`].

use ms_core::{LaneId, SegmentId, TurningPathId};
use ms_network::{Point, PolyLine, RoadNetwork};

use crate::error::{DriverError, DriverResult};

// ── Advance outcome ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Advance {
    /// Still on the same segment (possibly on a later polyline edge).
    Moved,
    /// The segment ended at a link boundary; the mover is now inside the
    /// intersection on the chosen turning path.
    EnteredIntersection,
    /// The turning path has been fully traversed; the driver should pick an
    /// exit lane and call [`PathMover::leave_intersection`].
    IntersectionDone,
    /// The whole path has been consumed.  `leftover` is the distance that
    /// could not be applied.
    PathDone { leftover: f64 },
}

// ── PathMover ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct PathMover {
    path: Vec<SegmentId>,
    seg_idx: usize,
    lane: LaneId,
    lane_index: usize,
    /// Current lane's polyline (cloned so lane shifts can swap it).
    polyline: PolyLine,
    edge_idx: usize,
    /// Metres into the current edge.
    dist_into_edge: f64,
    /// Sum of completed edge lengths on the current polyline.
    completed_len: f64,

    in_intersection: bool,
    turning: Option<TurningPathId>,
    turning_polyline: Option<PolyLine>,
    turning_offset: f64,

    /// Segment centre-line lengths for remaining-distance queries.
    seg_lengths: Vec<f64>,
    done: bool,
}

impl PathMover {
    /// Initialize over a non-empty segment sequence.
    ///
    /// `start_lane_index` is clamped into the first segment's lane range.
    pub fn new(
        network: &RoadNetwork,
        path: Vec<SegmentId>,
        start_lane_index: usize,
    ) -> DriverResult<Self> {
        if path.is_empty() {
            return Err(DriverError::NoPath("empty segment sequence".into()));
        }
        let seg_lengths = path
            .iter()
            .map(|&s| network.segment(s).length().0)
            .collect();
        let first = path[0];
        let lanes = network.lanes_of(first);
        let lane_index = start_lane_index.min(lanes.len() - 1);
        let lane = lanes[lane_index];
        Ok(Self {
            path,
            seg_idx: 0,
            lane,
            lane_index,
            polyline: network.lane(lane).polyline.clone(),
            edge_idx: 0,
            dist_into_edge: 0.0,
            completed_len: 0.0,
            in_intersection: false,
            turning: None,
            turning_polyline: None,
            turning_offset: 0.0,
            seg_lengths,
            done: false,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[inline]
    pub fn in_intersection(&self) -> bool {
        self.in_intersection
    }

    #[inline]
    pub fn current_segment(&self) -> SegmentId {
        self.path[self.seg_idx]
    }

    pub fn next_segment(&self) -> Option<SegmentId> {
        self.path.get(self.seg_idx + 1).copied()
    }

    pub fn second_segment(&self) -> Option<SegmentId> {
        self.path.get(self.seg_idx + 2).copied()
    }

    #[inline]
    pub fn current_lane(&self) -> LaneId {
        self.lane
    }

    #[inline]
    pub fn lane_index(&self) -> usize {
        self.lane_index
    }

    #[inline]
    pub fn turning(&self) -> Option<TurningPathId> {
        self.turning
    }

    /// Distance along the current lane polyline.
    #[inline]
    pub fn dist_along_polyline(&self) -> f64 {
        self.completed_len + self.dist_into_edge
    }

    /// Distance along the current segment (identical to the polyline offset;
    /// lane polylines span their whole segment).
    #[inline]
    pub fn dist_along_segment(&self) -> f64 {
        self.dist_along_polyline()
    }

    #[inline]
    pub fn current_polyline_length(&self) -> f64 {
        self.polyline.length().0
    }

    /// Remaining metres on the current lane polyline.
    #[inline]
    pub fn dist_to_segment_end(&self) -> f64 {
        (self.current_polyline_length() - self.dist_along_polyline()).max(0.0)
    }

    /// Remaining metres to the end of the current *link* (the stop line of
    /// the coming intersection).
    pub fn dist_to_link_end(&self, network: &RoadNetwork) -> f64 {
        if self.in_intersection {
            return 0.0;
        }
        let curr_link = network.segment(self.current_segment()).link;
        let mut dist = self.dist_to_segment_end();
        for (i, &seg) in self.path.iter().enumerate().skip(self.seg_idx + 1) {
            if network.segment(seg).link != curr_link {
                break;
            }
            dist += self.seg_lengths[i];
        }
        dist
    }

    /// Remaining metres of the whole path (segment centre lines; turning
    /// paths excluded).
    pub fn dist_remaining(&self) -> f64 {
        if self.done {
            return 0.0;
        }
        let rest: f64 = self.seg_lengths[self.seg_idx + 1..].iter().sum();
        if self.in_intersection {
            rest
        } else {
            rest + self.dist_to_segment_end()
        }
    }

    /// Progress along the turning path while inside an intersection.
    #[inline]
    pub fn turning_offset(&self) -> f64 {
        self.turning_offset
    }

    /// Cartesian position by interpolation on the active polyline.
    pub fn position(&self) -> Point {
        if self.in_intersection {
            let pl = self.turning_polyline.as_ref().expect("turning set while in intersection");
            pl.position_at(ms_core::Meters(self.turning_offset))
        } else {
            self.polyline.position_at(ms_core::Meters(self.dist_along_polyline()))
        }
    }

    // ── Advancing ─────────────────────────────────────────────────────────

    /// Consume `distance` metres of path.
    pub fn advance(&mut self, network: &RoadNetwork, distance: f64) -> DriverResult<Advance> {
        if self.done {
            return Err(DriverError::AdvancePastEnd);
        }

        if self.in_intersection {
            self.turning_offset += distance;
            let len = self
                .turning_polyline
                .as_ref()
                .map(|p| p.length().0)
                .unwrap_or(0.0);
            return Ok(if self.turning_offset >= len {
                Advance::IntersectionDone
            } else {
                Advance::Moved
            });
        }

        self.dist_into_edge += distance;
        loop {
            let edge_len = self.polyline.edge_length(self.edge_idx).0;
            if self.dist_into_edge < edge_len {
                return Ok(Advance::Moved);
            }

            // Edge exhausted.
            self.dist_into_edge -= edge_len;
            self.completed_len += edge_len;
            if self.edge_idx + 1 < self.polyline.num_edges() {
                self.edge_idx += 1;
                continue;
            }

            // Segment exhausted.
            let leftover = self.dist_into_edge;
            match self.next_segment() {
                None => {
                    // Path complete: park exactly at the final polypoint.
                    self.dist_into_edge = edge_len;
                    self.completed_len -= edge_len;
                    self.done = true;
                    return Ok(Advance::PathDone { leftover });
                }
                Some(next) => {
                    let curr_seg = network.segment(self.current_segment());
                    let next_seg = network.segment(next);
                    let new_link = next_seg.link != curr_seg.link;
                    let boundary = network.node(network.link(curr_seg.link).to_node);

                    if new_link && !boundary.node_type.is_merge() {
                        self.enter_intersection(network, next, leftover);
                        return Ok(Advance::EnteredIntersection);
                    }

                    // Direct seam crossing: same link, or a merge node.
                    self.move_to_segment(network, leftover);
                    // Loop continues in case leftover spans the new segment's
                    // first edge too.
                }
            }
        }
    }

    fn enter_intersection(&mut self, network: &RoadNetwork, next: SegmentId, leftover: f64) {
        // Prefer the turning path leaving the current lane; fall back to any
        // path into the next segment so a mis-positioned driver still
        // crosses (it simply crosses on a neighbor's geometry).
        let turning = network
            .lanes_of(next)
            .iter()
            .find_map(|&to| network.turning_path_between(self.lane, to))
            .or_else(|| {
                network
                    .turning_paths
                    .iter()
                    .find(|tp| {
                        network.lane(tp.to_lane).segment == next
                            && network.lane(tp.from_lane).segment == self.current_segment()
                    })
                    .map(|tp| tp.id)
            });

        match turning {
            Some(tp) => {
                self.turning = Some(tp);
                self.turning_polyline = Some(network.turning_path(tp).polyline.clone());
                self.turning_offset = leftover;
                self.in_intersection = true;
                self.dist_into_edge = 0.0;
            }
            None => {
                // No turning geometry at all: cross the seam directly and
                // let the reduced network carry the vehicle through.
                log::warn!(
                    "no turning path from lane {} into segment {}; crossing directly",
                    self.lane,
                    next
                );
                self.move_to_segment(network, leftover);
            }
        }
    }

    /// Direct transition onto the next path segment.
    fn move_to_segment(&mut self, network: &RoadNetwork, leftover: f64) {
        self.seg_idx += 1;
        let seg = self.current_segment();
        let lanes = network.lanes_of(seg);
        self.lane_index = self.lane_index.min(lanes.len() - 1);
        self.lane = lanes[self.lane_index];
        self.polyline = network.lane(self.lane).polyline.clone();
        self.edge_idx = 0;
        self.completed_len = 0.0;
        self.dist_into_edge = leftover;
    }

    /// Exit the intersection onto `to_lane_index` of the next segment
    /// (clamped).  Returns the chosen lane.
    pub fn leave_intersection(
        &mut self,
        network: &RoadNetwork,
        to_lane_index: usize,
    ) -> DriverResult<LaneId> {
        if !self.in_intersection {
            return Err(DriverError::NotInIntersection);
        }
        // Whatever overshot the turning spills onto the new segment.
        let turning_len = self
            .turning_polyline
            .as_ref()
            .map(|p| p.length().0)
            .unwrap_or(0.0);
        let spill = (self.turning_offset - turning_len).max(0.0);

        self.in_intersection = false;
        self.turning = None;
        self.turning_polyline = None;
        self.turning_offset = 0.0;

        self.seg_idx += 1;
        let seg = self.current_segment();
        let lanes = network.lanes_of(seg);
        self.lane_index = to_lane_index.min(lanes.len() - 1);
        self.lane = lanes[self.lane_index];
        self.polyline = network.lane(self.lane).polyline.clone();
        self.edge_idx = 0;
        self.completed_len = 0.0;
        self.dist_into_edge = spill.min(self.polyline.length().0);
        Ok(self.lane)
    }

    // ── Lane changes ──────────────────────────────────────────────────────

    /// Shift one lane left (+1) or right (−1), preserving the travelled
    /// edge count and edge offset on the new lane's polyline.
    pub fn shift_lane(&mut self, network: &RoadNetwork, delta: i32) -> DriverResult<LaneId> {
        let target = self.lane_index as i64 + delta as i64;
        if target < 0 {
            return Err(DriverError::LaneOutOfRange {
                index: usize::MAX,
                count: network.lanes_of(self.current_segment()).len(),
            });
        }
        self.move_to_lane(network, target as usize)
    }

    /// Move to an explicit lane index on the current segment.
    pub fn move_to_lane(&mut self, network: &RoadNetwork, index: usize) -> DriverResult<LaneId> {
        if self.in_intersection {
            return Err(DriverError::ShiftInIntersection);
        }
        let lanes = network.lanes_of(self.current_segment());
        if index >= lanes.len() {
            return Err(DriverError::LaneOutOfRange {
                index,
                count: lanes.len(),
            });
        }
        self.lane_index = index;
        self.lane = lanes[index];
        self.polyline = network.lane(self.lane).polyline.clone();

        // Re-anchor on the new polyline: keep the same travelled-edge count,
        // clamping where the new lane has different edge lengths.
        self.edge_idx = self.edge_idx.min(self.polyline.num_edges() - 1);
        self.completed_len = self.polyline.edge_start_offset(self.edge_idx).0;
        self.dist_into_edge = self
            .dist_into_edge
            .min(self.polyline.edge_length(self.edge_idx).0);
        Ok(self.lane)
    }
}
