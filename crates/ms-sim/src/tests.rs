//! Unit and end-to-end tests for the scheduler.

use ms_core::{
    Centimeters, DriverId, Meters, MetersPerSec, MutexStrategy, ParameterManager, SimConfig, Tick,
};
use ms_driver::DriverObservable;
use ms_network::{
    LinkType, NodeType, Point, RawConflict, RawLane, RawLink, RawNode, RawObstacle,
    RawObstacleKind, RawSegment, RawTurningGroup, RawTurningPath, RoadNetwork, RoadNetworkBuilder,
};
use ms_perception::TrafficColor;

use crate::buffer::Shared;
use crate::demand::{load_trips_reader, Trip};
use crate::builder::SimBuilder;
use crate::observer::{NoopObserver, SimObserver};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn config(total_ticks: u64) -> SimConfig {
    let mut cfg = SimConfig {
        base_gran_ms: 100,
        total_ticks,
        seed: 42,
        ..SimConfig::default()
    };
    // Deterministic tests: no perception lag.
    cfg.reaction_time.mean_ms = 0.0;
    cfg.reaction_time.stddev_ms = 0.0;
    cfg
}

/// Parameters with deterministic tables and zero stochastic terms.
fn quiet_params() -> ParameterManager {
    let mut pm = ParameterManager::with_defaults();
    pm.set("max_acc_car1", "2.0 2.0 2.0 2.0 2.0");
    pm.set("normal_deceleration_car1", "2.0 2.0 2.0 2.0 2.0");
    pm.set("max_deceleration_car1", "8.0 8.0 8.0 8.0 8.0");
    pm.set("max_acceleration_scale", "1.0");
    pm.set("cf_param_accelerating", "0.0400 0.7220 0.2420 0.6820 0.6000 0.0");
    pm.set("cf_param_decelerating", "-0.0418 0.0000 0.1510 0.6840 0.6800 0.0");
    for i in 0..8 {
        let base = pm.raw(&format!("LC_GAP_MODELS_{i}")).unwrap().to_owned();
        let mut cols: Vec<String> = base
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();
        cols[8] = "0.0".into();
        pm.set(&format!("LC_GAP_MODELS_{i}"), &cols.join(" "));
    }
    pm
}

fn straight(y: f64, x0: f64, x1: f64) -> Vec<Point> {
    vec![Point::new(x0, y), Point::new(x1, y)]
}

/// A single one-link road: node 1 → node 2, one segment, `lanes` lanes of
/// `length` metres at `max_speed` m/s.
fn single_road(length: f64, lanes: usize, max_speed: f64) -> RoadNetworkBuilder {
    let mut b = RoadNetworkBuilder::new();
    b.add_node(RawNode { id: 1, x: 0.0, y: 0.0, node_type: NodeType::Default });
    b.add_node(RawNode { id: 2, x: length, y: 0.0, node_type: NodeType::Default });
    b.add_link(RawLink {
        id: 10, from_node: 1, to_node: 2,
        link_type: LinkType::Urban, category: 0, road_name: "road".into(),
    });
    b.add_segment(RawSegment {
        id: 100, link: 10, sequence: 0, max_speed: MetersPerSec(max_speed),
        polyline: straight(0.0, 0.0, length),
    });
    for idx in 0..lanes {
        b.add_lane(RawLane {
            id: 1000 + idx as u64,
            segment: 100, index: idx, pedestrian_only: false,
            width: Meters(3.5),
            polyline: straight(idx as f64 * 3.5, 0.0, length),
        });
    }
    b
}

fn car(start_ms: u64, origin: u64, dest: u64, desired: f64) -> Trip {
    Trip {
        start: ms_core::Millis(start_ms),
        origin_ext: origin,
        destination_ext: dest,
        desired_speed: desired,
        vehicle: ms_driver::VehicleType::Car,
    }
}

// ── Double buffer ─────────────────────────────────────────────────────────────

#[test]
fn buffered_write_is_hidden_until_flip() {
    for strategy in [MutexStrategy::Buffered, MutexStrategy::Locked] {
        let mut s: Shared<i32> = Shared::new(strategy, 0);
        s.set(7);
        assert_eq!(s.get(), 0, "writers must not observe their own writes");
        s.flip();
        assert_eq!(s.get(), 7);
        s.set(9);
        assert_eq!(s.get(), 7);
        s.flip();
        assert_eq!(s.get(), 9);
    }
}

#[test]
fn force_overwrites_both_slots() {
    let mut s: Shared<i32> = Shared::new(MutexStrategy::Buffered, 1);
    s.force(5);
    assert_eq!(s.get(), 5);
    s.flip();
    assert_eq!(s.get(), 5);
}

// ── Demand loader ─────────────────────────────────────────────────────────────

#[test]
fn trips_parse_from_csv() {
    let csv = "start_ms,origin,destination,desired_speed_mps,vehicle\n\
               0,1,2,15.0,car\n\
               2000,1,2,12.0,bus\n";
    let trips = load_trips_reader(std::io::Cursor::new(csv)).unwrap();
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].desired_speed, 15.0);
    assert_eq!(trips[1].vehicle, ms_driver::VehicleType::Bus);
}

#[test]
fn unknown_vehicle_type_is_an_error() {
    let csv = "start_ms,origin,destination,desired_speed_mps,vehicle\n0,1,2,15.0,hovercraft\n";
    assert!(load_trips_reader(std::io::Cursor::new(csv)).is_err());
}

// ── Scenario 1: free-flow convergence ─────────────────────────────────────────

#[test]
fn free_flow_converges_to_desired_speed() {
    let net = single_road(500.0, 1, 15.0).build();
    let mut sim = SimBuilder::new(config(400), net)
        .params(quiet_params())
        .trips(vec![car(0, 1, 2, 15.0)])
        .build()
        .unwrap();

    // 10 s = 100 ticks at 100 ms.
    sim.run_ticks(100, &mut NoopObserver).unwrap();
    let obs = sim.observable(DriverId(0)).expect("driver still on the road");
    assert!(
        (obs.velocity - 15.0).abs() < 0.1,
        "v = {} after 10 s",
        obs.velocity
    );
    // 2 m/s² to 15 m/s takes 7.5 s covering 56.25 m; then cruise.
    let expected_pos = 56.25 + 2.5 * 15.0;
    assert!(
        (obs.dist_along_segment - expected_pos).abs() < 2.0,
        "x = {} after 10 s",
        obs.dist_along_segment
    );

    // The trip finishes once the 500 m are consumed.
    sim.run_ticks(300, &mut NoopObserver).unwrap();
    assert_eq!(sim.stats.completed, 1);
    assert_eq!(sim.active_count(), 0);
}

#[test]
fn speed_never_exceeds_lane_limit() {
    let net = single_road(500.0, 1, 12.0).build();
    let mut sim = SimBuilder::new(config(300), net)
        .params(quiet_params())
        .trips(vec![car(0, 1, 2, 99.0)]) // wants far more than the road allows
        .build()
        .unwrap();

    struct MaxSpeed(f64);
    impl SimObserver for MaxSpeed {
        fn on_snapshot(&mut self, _t: Tick, obs: &[Option<DriverObservable>]) {
            for o in obs.iter().flatten() {
                self.0 = self.0.max(o.velocity);
                assert!(o.velocity >= 0.0);
            }
        }
    }
    sim.config.output_interval_ticks = 1;
    let mut max = MaxSpeed(0.0);
    sim.run(&mut max).unwrap();
    assert!(max.0 <= 12.0 + 1e-9, "max speed {}", max.0);
}

// ── Scenario 2: car-following stability ───────────────────────────────────────

#[test]
fn follower_stabilizes_behind_slower_leader() {
    let net = single_road(2_000.0, 1, 20.0).build();
    let mut pm = quiet_params();
    // Comfortable braking tuned so the normal stopping distance from the
    // leader's speed sits at the upper headway band edge (≈ v·1.6 s).
    pm.set("normal_deceleration_car1", "3.2 3.2 3.2 3.2 3.2");
    let mut sim = SimBuilder::new(config(1_200), net)
        .params(pm)
        .trips(vec![
            car(0, 1, 2, 10.0),     // leader cruises at 10 m/s
            car(3_000, 1, 2, 15.0), // follower wants 15
        ])
        .build()
        .unwrap();

    sim.run_ticks(900, &mut NoopObserver).unwrap(); // 90 s
    let leader = sim.observable(DriverId(0)).unwrap();
    let follower = sim.observable(DriverId(1)).unwrap();

    // One tick of acceleration is 0.2 m/s, so speed matching is only ever
    // within that granularity.
    assert!(
        (follower.velocity - leader.velocity).abs() < 0.25,
        "follower {} vs leader {}",
        follower.velocity,
        leader.velocity
    );
    let gap = leader.dist_along_segment - leader.length_m - follower.dist_along_segment;
    // Steady gap ≈ v · hBufferUpper = 16 m.
    assert!(
        (gap - 16.0).abs() < 1.5,
        "steady-state gap {gap} m, expected ≈ 16 m"
    );
}

#[test]
fn same_lane_vehicles_never_overlap() {
    let net = single_road(2_000.0, 1, 20.0).build();
    let mut sim = SimBuilder::new(config(900), net)
        .params(quiet_params())
        .trips(vec![
            car(0, 1, 2, 8.0),
            car(2_000, 1, 2, 15.0),
            car(4_000, 1, 2, 18.0),
        ])
        .build()
        .unwrap();

    struct Overlap;
    impl SimObserver for Overlap {
        fn on_snapshot(&mut self, tick: Tick, obs: &[Option<DriverObservable>]) {
            let mut on_lane: Vec<&DriverObservable> = obs
                .iter()
                .flatten()
                .filter(|o| o.lane.is_some() && !o.is_queuing)
                .collect();
            on_lane.sort_by(|a, b| a.dist_along_segment.total_cmp(&b.dist_along_segment));
            for w in on_lane.windows(2) {
                if w[0].lane != w[1].lane {
                    continue;
                }
                let rear_of_front = w[1].dist_along_segment - w[1].length_m;
                assert!(
                    w[0].dist_along_segment <= rear_of_front + 1e-6,
                    "overlap at {tick}: {} vs {}",
                    w[0].dist_along_segment,
                    w[1].dist_along_segment
                );
            }
        }
    }
    sim.config.output_interval_ticks = 1;
    sim.run(&mut Overlap).unwrap();
}

// ── Scenario 3: discretionary lane change ─────────────────────────────────────

#[test]
fn dlc_overtakes_a_slow_leader() {
    let net = single_road(1_000.0, 2, 20.0).build();
    let mut sim = SimBuilder::new(config(600), net)
        .params(quiet_params())
        .trips(vec![
            car(0, 1, 2, 5.0),      // slow leader in lane 0
            car(2_500, 1, 2, 15.0), // subject
        ])
        .build()
        .unwrap();

    // Give the subject up to 25 s after dispatch.
    let mut changed_at = None;
    for t in 0..250 {
        sim.run_ticks(1, &mut NoopObserver).unwrap();
        if let Some(obs) = sim.observable(DriverId(1)) {
            if obs.lane_index == 1 {
                changed_at = Some(t);
                break;
            }
        }
    }
    assert!(
        changed_at.is_some(),
        "subject never left the blocked lane"
    );
}

// ── Scenario 4: slot-based intersection ───────────────────────────────────────

/// Two 400 m approach links meeting an exit link at node 3; the two turning
/// paths cross and conflict.
fn crossing_network() -> RoadNetwork {
    let mut b = RoadNetworkBuilder::new();
    b.add_node(RawNode { id: 1, x: 0.0, y: 0.0, node_type: NodeType::Default });
    b.add_node(RawNode { id: 2, x: 0.0, y: 20.0, node_type: NodeType::Default });
    b.add_node(RawNode { id: 3, x: 400.0, y: 10.0, node_type: NodeType::Signalized });
    b.add_node(RawNode { id: 4, x: 800.0, y: 10.0, node_type: NodeType::Default });

    for (id, from, name) in [(10u64, 1u64, "approach a"), (20, 2, "approach b")] {
        b.add_link(RawLink {
            id, from_node: from, to_node: 3,
            link_type: LinkType::Urban, category: 0, road_name: name.into(),
        });
    }
    b.add_link(RawLink {
        id: 30, from_node: 3, to_node: 4,
        link_type: LinkType::Urban, category: 0, road_name: "exit".into(),
    });

    b.add_segment(RawSegment {
        id: 100, link: 10, sequence: 0, max_speed: MetersPerSec(15.0),
        polyline: vec![Point::new(0.0, 0.0), Point::new(395.0, 10.0)],
    });
    b.add_segment(RawSegment {
        id: 200, link: 20, sequence: 0, max_speed: MetersPerSec(15.0),
        polyline: vec![Point::new(0.0, 20.0), Point::new(395.0, 10.0)],
    });
    b.add_segment(RawSegment {
        id: 300, link: 30, sequence: 0, max_speed: MetersPerSec(15.0),
        polyline: straight(10.0, 405.0, 800.0),
    });

    for (lane, seg) in [(1000u64, 100u64), (2000, 200)] {
        let y0 = if seg == 100 { 0.0 } else { 20.0 };
        b.add_lane(RawLane {
            id: lane, segment: seg, index: 0, pedestrian_only: false,
            width: Meters(3.5),
            polyline: vec![Point::new(0.0, y0), Point::new(395.0, 10.0)],
        });
    }
    for idx in 0..2u64 {
        b.add_lane(RawLane {
            id: 3000 + idx, segment: 300, index: idx as usize, pedestrian_only: false,
            width: Meters(3.5),
            polyline: straight(10.0 + idx as f64 * 3.5, 405.0, 800.0),
        });
    }

    for (gid, from_link) in [(5u64, 10u64), (6, 20)] {
        b.add_turning_group(RawTurningGroup { id: gid, node: 3, from_link, to_link: 30 });
    }
    b.add_turning_path(RawTurningPath {
        id: 50, group: 5, from_lane: 1000, to_lane: 3000,
        polyline: vec![Point::new(395.0, 10.0), Point::new(405.0, 10.0)],
    });
    b.add_turning_path(RawTurningPath {
        id: 51, group: 6, from_lane: 2000, to_lane: 3001,
        polyline: vec![Point::new(395.0, 10.0), Point::new(405.0, 13.5)],
    });
    b.add_conflict(RawConflict { first_turning: 50, second_turning: 51, priority: 1 });
    b.build()
}

#[test]
fn conflicting_arrivals_are_separated_and_both_cross() {
    let net = crossing_network();
    let mut sim = SimBuilder::new(config(1_500), net)
        .params(quiet_params())
        .trips(vec![car(0, 1, 4, 15.0), car(0, 2, 4, 15.0)])
        .build()
        .unwrap();

    // Run until both drivers have their grants.
    let mut granted = None;
    for _ in 0..600 {
        sim.run_ticks(1, &mut NoopObserver).unwrap();
        let (Some(a), Some(b)) = (sim.driver(DriverId(0)), sim.driver(DriverId(1))) else {
            break;
        };
        if a.params.is_response_received && b.params.is_response_received {
            granted = Some((a.params.access_time, b.params.access_time));
            break;
        }
    }
    let (ga, gb) = granted.expect("both drivers should receive grants");
    assert!(
        (ga - gb).abs() >= 2.0 - 1e-9,
        "conflicting grants too close: {ga} vs {gb}"
    );

    // Both clear the intersection and finish their trips.
    sim.run_ticks(900, &mut NoopObserver).unwrap();
    assert_eq!(sim.stats.completed, 2, "stats: {:?}", sim.stats);
}

// ── Scenario 5: signal stop ───────────────────────────────────────────────────

#[test]
fn red_signal_stops_the_driver_at_the_line() {
    let net = single_road(200.0, 1, 20.0).build();
    let mut sim = SimBuilder::new(config(900), net)
        .params(quiet_params())
        .trips(vec![car(0, 1, 2, 10.0)])
        .build()
        .unwrap();
    assert!(sim.set_signal(100, TrafficColor::Red));

    sim.run_ticks(900, &mut NoopObserver).unwrap();
    assert_eq!(sim.stats.completed, 0, "red light must not be crossed");
    let obs = sim.observable(DriverId(0)).unwrap();
    let dist_to_line = 200.0 - obs.dist_along_segment;
    assert!(
        dist_to_line <= 1.0 && dist_to_line >= 0.0,
        "stopped {dist_to_line} m from the line"
    );
    assert!(obs.velocity < 0.1, "still moving at {}", obs.velocity);
}

#[test]
fn green_signal_is_ignored() {
    let net = single_road(200.0, 1, 20.0).build();
    let mut sim = SimBuilder::new(config(600), net)
        .params(quiet_params())
        .trips(vec![car(0, 1, 2, 10.0)])
        .build()
        .unwrap();
    sim.set_signal(100, TrafficColor::Green);
    sim.run(&mut NoopObserver).unwrap();
    assert_eq!(sim.stats.completed, 1);
}

// ── Scenario 6: bus dwell ─────────────────────────────────────────────────────

#[test]
fn bus_dwells_off_the_lane_for_the_computed_time() {
    let mut b = single_road(400.0, 1, 20.0);
    b.add_obstacle(RawObstacle {
        segment: 100,
        offset: Centimeters(20_000), // stop at 200 m
        item: RawObstacleKind::BusStop { id: 7, name: "stop".into(), has_bay: false },
    });
    let net = b.build();

    let mut sim = SimBuilder::new(config(1_200), net)
        .params(quiet_params())
        .trips(vec![Trip {
            start: ms_core::Millis(0),
            origin_ext: 1,
            destination_ext: 2,
            desired_speed: 12.0,
            vehicle: ms_driver::VehicleType::Bus,
        }])
        .build()
        .unwrap();

    struct QueueTicks(usize);
    impl SimObserver for QueueTicks {
        fn on_snapshot(&mut self, _t: Tick, obs: &[Option<DriverObservable>]) {
            if obs.iter().flatten().any(|o| o.is_queuing) {
                self.0 += 1;
            }
        }
    }
    sim.config.output_interval_ticks = 1;
    let mut queueing = QueueTicks(0);
    sim.run(&mut queueing).unwrap();

    // Default bus load: 5 boarders, 3 alighters, no bay, not full →
    // DT = 0.7 + max(3.5·5, 1.0·3) = 18.2 s = 182 ticks.
    assert!(
        (queueing.0 as i64 - 182).unsigned_abs() <= 15,
        "dwelled for {} ticks, expected ≈ 182",
        queueing.0
    );
    assert_eq!(sim.stats.completed, 1, "bus should finish after the dwell");
}

// ── Incidents ─────────────────────────────────────────────────────────────────

#[test]
fn incident_clamps_segment_speed() {
    let mut b = single_road(300.0, 1, 20.0);
    b.add_obstacle(RawObstacle {
        segment: 100,
        offset: Centimeters(10_000),
        item: RawObstacleKind::Incident { speed_limit: MetersPerSec(5.0) },
    });
    let mut sim = SimBuilder::new(config(600), b.build())
        .params(quiet_params())
        .trips(vec![car(0, 1, 2, 15.0)])
        .build()
        .unwrap();

    struct MaxSpeed(f64);
    impl SimObserver for MaxSpeed {
        fn on_snapshot(&mut self, _t: Tick, obs: &[Option<DriverObservable>]) {
            for o in obs.iter().flatten() {
                self.0 = self.0.max(o.velocity);
            }
        }
    }
    sim.config.output_interval_ticks = 1;
    let mut max = MaxSpeed(0.0);
    sim.run(&mut max).unwrap();
    assert!(max.0 <= 5.0 + 1e-9, "incident ignored: max speed {}", max.0);
}

// ── Dispatch / reap bookkeeping ───────────────────────────────────────────────

#[test]
fn unroutable_trip_is_dropped_with_stats() {
    let net = single_road(100.0, 1, 15.0).build();
    let mut sim = SimBuilder::new(config(10), net)
        .params(quiet_params())
        .trips(vec![car(0, 2, 1, 15.0)]) // against the one-way direction
        .build()
        .unwrap();
    sim.run(&mut NoopObserver).unwrap();
    assert_eq!(sim.stats.dropped_no_path, 1);
    assert_eq!(sim.stats.dispatched, 0);
}

#[test]
fn observer_sees_removal_exactly_once() {
    let net = single_road(100.0, 1, 15.0).build();
    let mut sim = SimBuilder::new(config(600), net)
        .params(quiet_params())
        .trips(vec![car(0, 1, 2, 15.0)])
        .build()
        .unwrap();

    struct Removals(Vec<DriverId>);
    impl SimObserver for Removals {
        fn on_driver_removed(&mut self, _t: Tick, d: DriverId) {
            self.0.push(d);
        }
    }
    let mut removals = Removals(Vec::new());
    sim.run(&mut removals).unwrap();
    assert_eq!(removals.0, vec![DriverId(0)]);
}

#[test]
fn fixed_seed_reproduces_trajectories() {
    let run = || {
        let net = single_road(800.0, 2, 20.0).build();
        let mut sim = SimBuilder::new(config(400), net)
            .trips(vec![car(0, 1, 2, 12.0), car(1_000, 1, 2, 15.0)])
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        (0..2u32)
            .map(|i| sim.observable(DriverId(i)).map(|o| (o.dist_along_segment, o.velocity)))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
