//! `NeighborQuery` — nearest-vehicle slots from the tick T−1 snapshot.
//!
//! Distances are measured along lane polylines (segment offsets), never
//! Euclidean; "left" is the higher lane index.  Dwelling (queuing) vehicles
//! and vehicles inside intersections are not on any lane and are excluded
//! when the per-lane index is built.

use ms_behavior::{NearestVehicle, NeighborSet};
use ms_core::{DriverId, LaneId, SegmentId};
use ms_driver::DriverObservable;
use ms_network::RoadNetwork;
use rustc_hash::FxHashMap;

/// How far a driver looks, metres.
#[derive(Copy, Clone, Debug)]
pub struct VisibilityEnvelope {
    pub fwd: f64,
    pub back: f64,
}

impl Default for VisibilityEnvelope {
    fn default() -> Self {
        Self { fwd: 30.0, back: 5.0 }
    }
}

/// One vehicle's entry in the per-lane index.
#[derive(Copy, Clone, Debug)]
struct LaneEntry {
    driver: DriverId,
    /// Front-bumper offset along the segment, metres.
    offset: f64,
    length: f64,
    velocity: f64,
    acceleration: f64,
}

/// Per-lane sorted snapshot, rebuilt once per tick and shared by all
/// drivers' queries.
pub struct LaneIndex {
    by_lane: FxHashMap<LaneId, Vec<LaneEntry>>,
}

impl LaneIndex {
    /// O(N) scan over the observables plus an O(k log k) sort per lane.
    pub fn build(snapshot: &[Option<DriverObservable>]) -> Self {
        let mut by_lane: FxHashMap<LaneId, Vec<LaneEntry>> = FxHashMap::default();
        for (i, obs) in snapshot.iter().enumerate() {
            let Some(obs) = obs else { continue };
            if obs.is_queuing || obs.in_intersection {
                continue;
            }
            let Some(lane) = obs.lane else { continue };
            by_lane.entry(lane).or_default().push(LaneEntry {
                driver: DriverId(i as u32),
                offset: obs.dist_along_segment,
                length: obs.length_m,
                velocity: obs.velocity,
                acceleration: obs.acceleration,
            });
        }
        for entries in by_lane.values_mut() {
            entries.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        }
        Self { by_lane }
    }

    /// Nearest leader on `lane` ahead of `offset` (excluding `me`), within
    /// `max_dist` of bumper-to-bumper gap.
    fn leader(&self, lane: LaneId, me: DriverId, offset: f64, max_dist: f64) -> NearestVehicle {
        let Some(entries) = self.by_lane.get(&lane) else {
            return NearestVehicle::default();
        };
        entries
            .iter()
            .filter(|e| e.driver != me && e.offset >= offset)
            .map(|e| (e, (e.offset - e.length - offset).max(0.0)))
            .filter(|&(e, gap)| gap <= max_dist && !(e.offset == offset && e.driver < me))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, gap)| NearestVehicle {
                driver: Some(e.driver),
                distance: gap,
                velocity: e.velocity,
                acceleration: e.acceleration,
            })
            .unwrap_or_default()
    }

    /// Nearest follower on `lane` behind `offset`.
    fn follower(
        &self,
        lane: LaneId,
        me: DriverId,
        offset: f64,
        my_length: f64,
        max_dist: f64,
    ) -> NearestVehicle {
        let Some(entries) = self.by_lane.get(&lane) else {
            return NearestVehicle::default();
        };
        entries
            .iter()
            .filter(|e| e.driver != me && e.offset < offset)
            .map(|e| (e, (offset - my_length - e.offset).max(0.0)))
            .filter(|&(_, gap)| gap <= max_dist)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, gap)| NearestVehicle {
                driver: Some(e.driver),
                distance: gap,
                velocity: e.velocity,
                acceleration: e.acceleration,
            })
            .unwrap_or_default()
    }
}

/// The querying driver's own placement, assembled by the scheduler from the
/// agent (not the snapshot, so freshly dispatched drivers work too).
#[derive(Copy, Clone, Debug)]
pub struct QueryOrigin {
    pub me: DriverId,
    pub segment: SegmentId,
    pub lane_index: usize,
    /// Front-bumper offset along the segment.
    pub offset: f64,
    pub length: f64,
    /// Remaining metres on the current segment.
    pub dist_to_segment_end: f64,
    /// First path segment after the coming intersection, if any.
    pub next_link_segment: Option<SegmentId>,
}

/// Fill all nearest-vehicle slots for one driver.
pub fn query(
    network: &RoadNetwork,
    index: &LaneIndex,
    origin: &QueryOrigin,
    envelope: VisibilityEnvelope,
) -> NeighborSet {
    let lanes = network.lanes_of(origin.segment);
    let lane_at = |delta: i64| -> Option<LaneId> {
        let idx = origin.lane_index as i64 + delta;
        if idx < 0 {
            return None;
        }
        lanes.get(idx as usize).copied()
    };

    let mut set = NeighborSet::default();
    let fwd = |lane: Option<LaneId>, idx: &LaneIndex| match lane {
        Some(l) => idx.leader(l, origin.me, origin.offset, envelope.fwd),
        None => NearestVehicle::default(),
    };
    let back = |lane: Option<LaneId>, idx: &LaneIndex| match lane {
        Some(l) => idx.follower(l, origin.me, origin.offset, origin.length, envelope.back),
        None => NearestVehicle::default(),
    };

    set.fwd = fwd(lane_at(0), index);
    set.back = back(lane_at(0), index);
    set.left_fwd = fwd(lane_at(1), index);
    set.left_back = back(lane_at(1), index);
    set.right_fwd = fwd(lane_at(-1), index);
    set.right_back = back(lane_at(-1), index);
    set.left_fwd2 = fwd(lane_at(2), index);
    set.left_back2 = back(lane_at(2), index);
    set.right_fwd2 = fwd(lane_at(-2), index);
    set.right_back2 = back(lane_at(-2), index);

    // Downstream lookahead: the nearest vehicle just past the coming
    // intersection, measured as remaining-segment plus their offset.
    if let Some(next_seg) = origin.next_link_segment {
        let budget = (envelope.fwd - origin.dist_to_segment_end).max(0.0);
        if budget > 0.0 {
            let mut best = NearestVehicle::default();
            for &lane in network.lanes_of(next_seg) {
                let nv = index.leader(lane, origin.me, 0.0, budget);
                if nv.exists() && nv.distance + origin.dist_to_segment_end < best.distance {
                    best = NearestVehicle {
                        distance: nv.distance + origin.dist_to_segment_end,
                        ..nv
                    };
                }
            }
            set.fwd_next_link = best;
        }
    }

    set
}
