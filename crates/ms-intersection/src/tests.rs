//! Unit tests for the slot arbiter.

use ms_core::{DriverId, Meters, MetersPerSec, ParameterManager, TurningPathId};
use ms_msg::{Envelope, Message, Recipient};
use ms_network::{
    LinkType, NodeType, RawConflict, RawLane, RawLink, RawNode, RawSegment, RawTurningGroup,
    RawTurningPath, RoadNetwork, RoadNetworkBuilder, Point,
};

use crate::IntersectionManager;

// ── Network fixture ───────────────────────────────────────────────────────────

/// A single intersection with two conflicting 10 m turning paths.
fn crossing() -> RoadNetwork {
    let mut b = RoadNetworkBuilder::new();
    b.add_node(RawNode { id: 1, x: 0.0, y: 0.0, node_type: NodeType::Default });
    b.add_node(RawNode { id: 2, x: 100.0, y: 0.0, node_type: NodeType::Signalized });
    b.add_node(RawNode { id: 3, x: 200.0, y: 0.0, node_type: NodeType::Default });

    b.add_link(RawLink {
        id: 10, from_node: 1, to_node: 2,
        link_type: LinkType::Urban, category: 0, road_name: "in".into(),
    });
    b.add_link(RawLink {
        id: 20, from_node: 2, to_node: 3,
        link_type: LinkType::Urban, category: 0, road_name: "out".into(),
    });

    b.add_segment(RawSegment {
        id: 100, link: 10, sequence: 0, max_speed: MetersPerSec(15.0),
        polyline: vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
    });
    b.add_segment(RawSegment {
        id: 200, link: 20, sequence: 0, max_speed: MetersPerSec(15.0),
        polyline: vec![Point::new(100.0, 0.0), Point::new(200.0, 0.0)],
    });

    for (id, seg, idx, y) in [(1000u64, 100u64, 0usize, 0.0), (1001, 100, 1, 3.5),
                             (2000, 200, 0, 0.0), (2001, 200, 1, 3.5)] {
        let (x0, x1) = if seg == 100 { (0.0, 95.0) } else { (105.0, 200.0) };
        b.add_lane(RawLane {
            id, segment: seg, index: idx, pedestrian_only: false,
            width: Meters(3.5),
            polyline: vec![Point::new(x0, y), Point::new(x1, y)],
        });
    }

    b.add_turning_group(RawTurningGroup { id: 5, node: 2, from_link: 10, to_link: 20 });
    b.add_turning_path(RawTurningPath {
        id: 50, group: 5, from_lane: 1000, to_lane: 2000,
        polyline: vec![Point::new(95.0, 0.0), Point::new(105.0, 0.0)],
    });
    b.add_turning_path(RawTurningPath {
        id: 51, group: 5, from_lane: 1001, to_lane: 2001,
        polyline: vec![Point::new(95.0, 3.5), Point::new(105.0, 3.5)],
    });
    // Path 50 holds right of way over 51.
    b.add_conflict(RawConflict { first_turning: 50, second_turning: 51, priority: 1 });
    b.build()
}

fn manager(net: &RoadNetwork) -> IntersectionManager {
    let node = net.node_by_ext(2).unwrap();
    IntersectionManager::new(node, &ParameterManager::with_defaults()).unwrap()
}

fn path(net: &RoadNetwork, ext: u64) -> TurningPathId {
    net.turning_paths.iter().find(|p| p.ext_id == ext).unwrap().id
}

fn request(net: &RoadNetwork, driver: u32, path_ext: u64, at: f64) -> Envelope {
    Envelope {
        from: Recipient::Driver(DriverId(driver)),
        msg: Message::RequestIntArrTime {
            driver: DriverId(driver),
            turning_path: path(net, path_ext),
            requested_sec: at,
        },
    }
}

fn granted(replies: &[(Recipient, Message)], driver: u32) -> f64 {
    replies
        .iter()
        .find_map(|(to, msg)| match (to, msg) {
            (Recipient::Driver(d), Message::ReplyIntArrTime { granted_sec })
                if *d == DriverId(driver) =>
            {
                Some(*granted_sec)
            }
            _ => None,
        })
        .unwrap()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn lone_request_granted_as_asked() {
    let net = crossing();
    let mut mgr = manager(&net);
    let replies = mgr.process(0.0, &[request(&net, 0, 50, 10.0)], &net);
    assert_eq!(granted(&replies, 0), 10.0);
}

#[test]
fn conflicting_requests_are_separated() {
    let net = crossing();
    let mut mgr = manager(&net);
    let batch = [request(&net, 0, 50, 10.0), request(&net, 1, 51, 10.0)];
    let replies = mgr.process(0.0, &batch, &net);

    // Right-of-way path keeps its slot; the other is pushed by the
    // separation floor (2.0 s with default parameters — the 10 m turnings
    // traverse in 1 s each).
    assert_eq!(granted(&replies, 0), 10.0);
    assert_eq!(granted(&replies, 1), 12.0);
}

#[test]
fn separation_holds_across_batches() {
    let net = crossing();
    let mut mgr = manager(&net);
    let first = mgr.process(0.0, &[request(&net, 0, 50, 10.0)], &net);
    assert_eq!(granted(&first, 0), 10.0);

    // A later driver on the conflicting path asking for an earlier slot
    // still lands after the separation.
    let second = mgr.process(0.5, &[request(&net, 1, 51, 9.0)], &net);
    let g = granted(&second, 1);
    assert!(g >= 12.0, "expected >= 12.0, got {g}");
}

#[test]
fn non_conflicting_paths_share_the_instant() {
    let net = crossing();
    let mut mgr = manager(&net);
    // Two drivers on the SAME path: no conflict is registered for a path
    // with itself, so both may be granted the requested time.
    let batch = [request(&net, 0, 50, 10.0), request(&net, 1, 50, 10.0)];
    let replies = mgr.process(0.0, &batch, &net);
    assert_eq!(granted(&replies, 0), 10.0);
    assert_eq!(granted(&replies, 1), 10.0);
}

#[test]
fn rerequest_supersedes_previous_grant() {
    let net = crossing();
    let mut mgr = manager(&net);
    mgr.process(0.0, &[request(&net, 0, 50, 10.0)], &net);
    assert_eq!(mgr.grant_count(), 1);

    // Missed the slot; asks again later.
    let replies = mgr.process(11.0, &[request(&net, 0, 50, 14.0)], &net);
    assert_eq!(granted(&replies, 0), 14.0);
    assert_eq!(mgr.grant_count(), 1, "old grant replaced, not accumulated");
}

#[test]
fn release_clears_the_grant() {
    let net = crossing();
    let mut mgr = manager(&net);
    mgr.process(0.0, &[request(&net, 0, 50, 10.0)], &net);
    mgr.release(DriverId(0));
    assert_eq!(mgr.grant_count(), 0);

    // The conflicting path is now free at its requested time.
    let replies = mgr.process(0.1, &[request(&net, 1, 51, 10.0)], &net);
    assert_eq!(granted(&replies, 1), 10.0);
}

#[test]
fn stale_grants_are_pruned() {
    let net = crossing();
    let mut mgr = manager(&net);
    mgr.process(0.0, &[request(&net, 0, 50, 10.0)], &net);
    // Far in the future, the old grant no longer blocks anyone.
    let replies = mgr.process(100.0, &[request(&net, 1, 51, 100.0)], &net);
    assert_eq!(granted(&replies, 1), 100.0);
}
