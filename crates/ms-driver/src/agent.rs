//! `DriverAgent` — the per-tick frame cycle composing path mover,
//! perception, behavioral models, and intersection driving.
//!
//! The scheduler owns the surrounding phases: it pre-computes this driver's
//! neighbor slots from tick T−1 observables, drains its message inbox, calls
//! [`DriverAgent::frame_tick`], and double-buffers the returned observable.
//! The frame itself is pure with respect to other drivers — it reads only
//! its inputs and its own state.

use ms_behavior::{
    DriverUpdateParams, LaneChangeSide, NeighborSet, StopPointState,
};
use ms_core::{DriverId, LaneId, Millis, Seconds, SegmentId};
use ms_msg::{Envelope, Message, Recipient};
use ms_network::{Point, RoadItem, RoadNetwork};
use ms_perception::{DriverPerception, LeadObservation, Observation, SignalObservation};

use crate::bus::Role;
use crate::error::DriverResult;
use crate::intersection::{turn_speed_cap, SlotAction, SlotDriving, REQUEST_DISTANCE};
use crate::models::DriverModels;
use crate::path::{Advance, PathMover};
use crate::vehicle::Vehicle;

// ── Observable ────────────────────────────────────────────────────────────────

/// The double-buffered state other drivers read.
///
/// A reader in tick T sees the values written in tick T−1; the scheduler
/// flips the buffers between ticks.
#[derive(Clone, Debug)]
pub struct DriverObservable {
    pub position: Point,
    pub velocity: f64,
    pub acceleration: f64,
    pub segment: Option<SegmentId>,
    pub lane: Option<LaneId>,
    pub lane_index: usize,
    /// Offset along the current segment, metres.
    pub dist_along_segment: f64,
    pub turning_direction: LaneChangeSide,
    pub in_intersection: bool,
    pub length_m: f64,
    /// Off the travel lane (dwelling bus); excluded from neighbor queries.
    pub is_queuing: bool,
}

// ── Frame I/O ─────────────────────────────────────────────────────────────────

/// Everything the scheduler assembles for one driver's tick.
pub struct FrameInput<'a> {
    pub network: &'a RoadNetwork,
    pub models: &'a DriverModels,
    pub now: Millis,
    pub dt: Seconds,
    pub neighbors: NeighborSet,
    /// Messages addressed to this driver, delivered at the end of the
    /// previous tick.
    pub messages: Vec<Envelope>,
    /// Signal head governing the current segment's stop line, if any.
    pub signal: Option<SignalObservation>,
}

pub struct FrameOutput {
    pub observable: DriverObservable,
    pub outgoing: Vec<(Recipient, Message)>,
}

// ── DriverAgent ───────────────────────────────────────────────────────────────

pub struct DriverAgent {
    pub id: DriverId,
    pub vehicle: Vehicle,
    pub path: PathMover,
    pub perception: DriverPerception,
    pub params: DriverUpdateParams,
    pub role: Role,
    pub slot: SlotDriving,
    /// Desired cruise speed, m/s.
    pub desired_speed: f64,
    /// Accumulated lateral displacement while executing a lane change.
    pub lateral_offset: f64,
    /// Last plain stop point serviced, so it is not serviced twice.
    served_stop: Option<(SegmentId, ms_core::Centimeters)>,
    pub to_be_removed: bool,
}

impl DriverAgent {
    pub fn new(
        id: DriverId,
        vehicle: Vehicle,
        path: PathMover,
        perception: DriverPerception,
        role: Role,
        desired_speed: f64,
    ) -> Self {
        Self {
            id,
            vehicle,
            path,
            perception,
            params: DriverUpdateParams::default(),
            role,
            slot: SlotDriving::default(),
            desired_speed,
            lateral_offset: 0.0,
            served_stop: None,
            to_be_removed: false,
        }
    }

    /// One full frame: sense → decide → integrate → move → observe.
    pub fn frame_tick(
        &mut self,
        input: FrameInput<'_>,
        rng: &mut ms_core::DriverRng,
    ) -> DriverResult<FrameOutput> {
        let dt = input.dt.0;
        let now_sec = input.now.to_seconds().0;
        let mut outgoing = Vec::new();

        // ── 1–2. Fresh scratch + observed context ─────────────────────────
        self.params.reset(now_sec, dt);
        self.fill_lane_context(input.network);
        self.params.neighbors = input.neighbors;
        self.params.desired_speed = self.desired_speed;

        // ── Messages from the previous tick ───────────────────────────────
        for env in &input.messages {
            if let Message::ReplyIntArrTime { granted_sec } = env.msg {
                self.slot.on_reply(&mut self.params, granted_sec);
            }
        }

        // ── 3. Perception ─────────────────────────────────────────────────
        let obs = Observation {
            velocity: self.vehicle.velocity,
            acceleration: self.vehicle.fwd_accel,
            lead: input.neighbors.fwd.exists().then(|| LeadObservation {
                distance: input.neighbors.fwd.distance,
                velocity: input.neighbors.fwd.velocity,
                acceleration: input.neighbors.fwd.acceleration,
            }),
            signal: input.signal,
        };
        let snap = self.perception.update_and_sense(input.now, &obs)?;
        self.params.perceived_velocity = snap.velocity;
        self.params.perceived_acceleration = snap.acceleration;
        if let Some(lead) = snap.lead {
            self.params.perceived_dist_to_lead = lead.distance;
            self.params.perceived_lead_velocity = lead.velocity;
            self.params.perceived_lead_acceleration = lead.acceleration;
        }
        self.params.perceived_signal = snap.signal.map(|(c, d)| (c.0, d));

        // ── 4–5. Stops and the slot protocol ──────────────────────────────
        let stop_events = self.check_for_stops(input.network);
        outgoing.extend(stop_events);

        let mut slot_action = SlotAction::None;
        if !self.path.in_intersection() && !self.path.is_done() {
            if let Some((node, turning)) = self.upcoming_turning(input.network) {
                let dist_to_int = self.path.dist_to_link_end(input.network);
                self.params.is_before_intersection = true;
                if dist_to_int <= REQUEST_DISTANCE {
                    slot_action = self.slot.approach(
                        &mut self.params,
                        self.id,
                        node,
                        turning,
                        dist_to_int,
                        self.vehicle.velocity,
                        &mut outgoing,
                    );
                }
            }
        }

        // ── 6–7. Behavioral decisions ─────────────────────────────────────
        if !self.path.in_intersection() {
            self.params.new_fwd_acc = input
                .models
                .cf
                .make_accelerating_decision(&mut self.params, rng);
            self.params.new_lat_vel = input.models.lc.make_lateral_decision(&mut self.params, rng);
        }

        // ── 8–10. Integrate and move ──────────────────────────────────────
        self.integrate_and_move(input.network, input.models, slot_action, dt)?;

        // Bus dwell transitions piggyback on the stop-point machine.
        let bus_events = self.service_bus_stop(input.network);
        outgoing.extend(bus_events);

        // ── 11. Observable ────────────────────────────────────────────────
        Ok(FrameOutput {
            observable: self.observable(),
            outgoing,
        })
    }

    // ── Context assembly ──────────────────────────────────────────────────

    fn fill_lane_context(&mut self, network: &RoadNetwork) {
        let seg = network.segment(self.path.current_segment());
        let lane_count = seg.lanes.len();
        let idx = self.path.lane_index();

        self.params.curr_lane_index = idx;
        self.params.lane_count = lane_count;
        self.params.has_left_lane = idx + 1 < lane_count;
        self.params.has_left_lane2 = idx + 2 < lane_count;
        self.params.has_right_lane = idx >= 1;
        self.params.has_right_lane2 = idx >= 2;
        self.params.max_lane_speed = seg.max_speed.0;
        // An incident on this segment clamps the usable speed.
        for (_, item) in seg.obstacles_in(ms_core::Centimeters(0), seg.length().to_centimeters()) {
            if let RoadItem::Incident { speed_limit } = item {
                self.params.max_lane_speed = self.params.max_lane_speed.min(speed_limit.0);
            }
        }
        self.params.is_already_started = self.vehicle.velocity > 0.0
            || self.path.dist_along_segment() > 0.0;

        // Which lane must we be in for the seam ahead?
        self.params.next_lane_index = self.target_lane_index(network).unwrap_or(idx);
        self.params.turning_direction = match self
            .params
            .next_lane_index
            .cmp(&self.params.curr_lane_index)
        {
            std::cmp::Ordering::Greater => LaneChangeSide::Left,
            std::cmp::Ordering::Less => LaneChangeSide::Right,
            std::cmp::Ordering::Equal => LaneChangeSide::Same,
        };
        self.vehicle.turning_direction = self.params.turning_direction;

        // Distance to the point where the lane must be correct.
        if self.params.next_lane_index != self.params.curr_lane_index {
            self.params.is_mlc = true;
            self.params.dist_to_stop = if self.crosses_intersection_next(network) {
                self.path.dist_to_link_end(network)
            } else {
                self.path.dist_to_segment_end()
            };
        } else {
            self.params.is_mlc = false;
        }
    }

    fn crosses_intersection_next(&self, network: &RoadNetwork) -> bool {
        let Some(next) = self.path.next_segment() else {
            return false;
        };
        let curr = network.segment(self.path.current_segment());
        let next = network.segment(next);
        next.link != curr.link
            && !network
                .node(network.link(curr.link).to_node)
                .node_type
                .is_merge()
    }

    /// Lane index on the current segment from which the coming seam (same
    /// link connector or turning path) is reachable, preferring the nearest
    /// to the current lane.
    fn target_lane_index(&self, network: &RoadNetwork) -> Option<usize> {
        let next = self.path.next_segment()?;
        let seg = network.segment(self.path.current_segment());

        let connects = |lane: LaneId| -> bool {
            if self.crosses_intersection_next(network) {
                network
                    .lanes_of(next)
                    .iter()
                    .any(|&to| network.turning_path_between(lane, to).is_some())
            } else {
                network
                    .downstream_lanes(lane)
                    .any(|to| network.lane(to).segment == next)
            }
        };

        // No connector data at all: any lane goes.
        if !seg.lanes.iter().any(|&l| connects(l)) {
            return None;
        }
        seg.lanes
            .iter()
            .enumerate()
            .filter(|&(_, &l)| connects(l))
            .min_by_key(|&(i, _)| i.abs_diff(self.path.lane_index()))
            .map(|(i, _)| i)
    }

    /// The (node, turning path) of the intersection the driver will cross
    /// next, if the coming seam is an intersection seam.
    fn upcoming_turning(
        &self,
        network: &RoadNetwork,
    ) -> Option<(ms_core::NodeId, ms_core::TurningPathId)> {
        if !self.crosses_intersection_next(network) {
            return None;
        }
        let next = self.path.next_segment()?;
        let curr_seg = network.segment(self.path.current_segment());
        let node = network.link(curr_seg.link).to_node;

        let turning = network
            .lanes_of(next)
            .iter()
            .find_map(|&to| network.turning_path_between(self.path.current_lane(), to))
            .or_else(|| {
                network
                    .turning_paths
                    .iter()
                    .find(|tp| {
                        network.lane(tp.from_lane).segment == curr_seg.id
                            && network.lane(tp.to_lane).segment == next
                    })
                    .map(|tp| tp.id)
            })?;
        Some((node, turning))
    }

    // ── Stops ─────────────────────────────────────────────────────────────

    /// Keep the stop-point machine fed with the nearest unserved stop ahead
    /// on the current segment.  Buses service bus stops; every role
    /// services explicit stop points.
    fn check_for_stops(&mut self, network: &RoadNetwork) -> Vec<(Recipient, Message)> {
        let mut out = Vec::new();
        if self.path.in_intersection() || self.path.is_done() {
            return out;
        }
        let seg = network.segment(self.path.current_segment());
        let here_cm = ms_core::Meters(self.path.dist_along_segment()).to_centimeters();
        let end_cm = seg.length().to_centimeters();

        // Already servicing one: refresh the distance to it.
        if self.params.stop_state != StopPointState::NotPresent {
            self.params.dist_to_stop_point =
                self.params.stop_point_offset - self.path.dist_along_segment();
            if self.params.stop_state == StopPointState::Leaving {
                // Served; forget it and look again next tick.
                self.served_stop = Some((
                    self.path.current_segment(),
                    ms_core::Meters(self.params.stop_point_offset).to_centimeters(),
                ));
                if let Role::BusDriver(bus) = &mut self.role {
                    if let Some(stop) = bus.at_stop.take() {
                        let bs = network.bus_stop(stop);
                        bus.last_served = Some((bs.segment, bs.offset));
                        bus.exchange();
                        out.push((
                            Recipient::BusStop(stop),
                            Message::BusDeparture {
                                driver: self.id,
                                stop,
                            },
                        ));
                    }
                }
                self.vehicle.is_queuing = false;
                self.params.stop_state = StopPointState::NotPresent;
            }
            return out;
        }

        for (offset, item) in seg.obstacles_in(here_cm, end_cm) {
            let dist_ahead = (offset.to_meters().0 - here_cm.to_meters().0).max(0.0);
            match item {
                RoadItem::StopPoint { dwell } => {
                    if self.served_stop == Some((seg.id, offset)) {
                        continue;
                    }
                    self.params.stop_state = StopPointState::Approaching;
                    self.params.stop_dwell_sec = dwell.0;
                    self.params.dist_to_stop_point = dist_ahead;
                    self.params.stop_point_offset = offset.to_meters().0;
                    return out;
                }
                RoadItem::BusStop(stop_id) => {
                    if let Role::BusDriver(bus) = &mut self.role {
                        let bs = network.bus_stop(*stop_id);
                        if bus.last_served == Some((bs.segment, bs.offset)) {
                            continue;
                        }
                        self.params.stop_state = StopPointState::Approaching;
                        self.params.stop_dwell_sec = bus.dwell_for(bs.has_bay);
                        self.params.dist_to_stop_point = dist_ahead;
                        self.params.stop_point_offset = offset.to_meters().0;
                        bus.at_stop = Some(*stop_id);
                        return out;
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Emit bus arrival events and pull the bus off the lane while dwelling.
    fn service_bus_stop(&mut self, _network: &RoadNetwork) -> Vec<(Recipient, Message)> {
        let mut out = Vec::new();
        let Role::BusDriver(bus) = &self.role else {
            return out;
        };
        let Some(stop) = bus.at_stop else {
            return out;
        };
        if self.params.stop_state == StopPointState::Waiting && !self.vehicle.is_queuing {
            self.vehicle.is_queuing = true;
            out.push((
                Recipient::BusStop(stop),
                Message::BusArrival {
                    driver: self.id,
                    stop,
                },
            ));
        }
        // The dwell expires inside the stop-point machine; the machine's
        // transition to Leaving is picked up by check_for_stops next tick.
        if self.params.stop_state == StopPointState::Leaving && self.vehicle.is_queuing {
            self.vehicle.is_queuing = false;
        }
        out
    }

    // ── Integration ───────────────────────────────────────────────────────

    fn integrate_and_move(
        &mut self,
        network: &RoadNetwork,
        models: &DriverModels,
        slot_action: SlotAction,
        dt: f64,
    ) -> DriverResult<()> {
        let max_lane_speed = self.params.max_lane_speed.max(0.0);

        let dx = if self.path.in_intersection() {
            // Follow the turning polyline at curvature-capped speed.
            let cap = self
                .path
                .turning()
                .map(|tp| {
                    turn_speed_cap(
                        &network.turning_path(tp).polyline,
                        models.comfort_lat_acc,
                        max_lane_speed,
                    )
                })
                .unwrap_or(max_lane_speed);
            self.vehicle.velocity = self.vehicle.velocity.min(cap).max(1.0);
            self.vehicle.fwd_accel = 0.0;
            self.vehicle.velocity * dt
        } else {
            match slot_action {
                SlotAction::HoldSpeed(v) => {
                    self.vehicle.velocity = v.clamp(0.0, max_lane_speed);
                    self.vehicle.fwd_accel = 0.0;
                    self.vehicle.velocity * dt
                }
                SlotAction::Halt => {
                    self.vehicle.velocity = 0.0;
                    self.vehicle.fwd_accel = 0.0;
                    0.0
                }
                SlotAction::None => {
                    let a = self.params.new_fwd_acc;
                    let v_old = self.vehicle.velocity;
                    let v_new = (v_old + a * dt).clamp(0.0, max_lane_speed);
                    self.vehicle.fwd_accel = a;
                    self.vehicle.velocity = v_new;
                    ((v_old + v_new) * 0.5 * dt).max(0.0)
                }
            }
        };

        if dx > 0.0 {
            let was_inside = self.path.in_intersection();
            match self.path.advance(network, dx)? {
                Advance::Moved => {}
                Advance::EnteredIntersection => {
                    self.slot.enter();
                    self.vehicle.position_in_intersection = self.path.position();
                }
                Advance::IntersectionDone => {
                    let exit_lane = self
                        .path
                        .turning()
                        .map(|tp| {
                            let to = network.turning_path(tp).to_lane;
                            network.lane(to).index
                        })
                        .unwrap_or(self.path.lane_index());
                    self.path.leave_intersection(network, exit_lane)?;
                    self.slot.exit(&mut self.params);
                }
                Advance::PathDone { .. } => {
                    self.to_be_removed = true;
                }
            }
            if was_inside && self.path.in_intersection() {
                self.vehicle.position_in_intersection = self.path.position();
            }
        }

        // ── Lateral displacement and lane flip ────────────────────────────
        if !self.path.in_intersection() && !self.path.is_done() {
            self.vehicle.lat_velocity = self.params.new_lat_vel;
            self.lateral_offset += self.vehicle.lat_velocity * dt;
            let half_lane = network.lane(self.path.current_lane()).width.0 * 0.5;
            if self.lateral_offset.abs() >= half_lane {
                let delta = if self.lateral_offset > 0.0 { 1 } else { -1 };
                let can_shift = (delta > 0 && self.params.has_left_lane)
                    || (delta < 0 && self.params.has_right_lane);
                if can_shift {
                    self.path.shift_lane(network, delta)?;
                }
                // Execution complete; the cool-down keeps suppressing
                // re-decision but no longer steers.
                self.params.last_decision = LaneChangeSide::Same;
                self.lateral_offset = 0.0;
                self.vehicle.lat_velocity = 0.0;
            }
        }

        self.vehicle.position = self.path.position();
        Ok(())
    }

    fn observable(&self) -> DriverObservable {
        let inside = self.path.in_intersection();
        let done = self.path.is_done();
        DriverObservable {
            position: self.vehicle.position,
            velocity: self.vehicle.velocity,
            acceleration: self.vehicle.fwd_accel,
            segment: (!inside && !done).then(|| self.path.current_segment()),
            lane: (!inside && !done).then(|| self.path.current_lane()),
            lane_index: self.path.lane_index(),
            dist_along_segment: self.path.dist_along_segment(),
            turning_direction: self.vehicle.turning_direction,
            in_intersection: inside,
            length_m: self.vehicle.length_m(),
            is_queuing: self.vehicle.is_queuing,
        }
    }
}
