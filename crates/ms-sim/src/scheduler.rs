//! The `Scheduler` and its tick loop.

use std::collections::BTreeMap;

use ms_behavior::NeighborSet;
use ms_core::{
    DriverId, DriverRng, Millis, NodeId, Seconds, SegmentId, SimClock, SimConfig, Tick,
};
use ms_driver::{
    DriverAgent, DriverModels, DriverObservable, FrameInput, PathMover, Role, Vehicle, VehicleType,
};
use ms_intersection::IntersectionManager;
use ms_msg::{Envelope, Message, MessageBus, Recipient};
use ms_network::{RoadNetwork, Router, TravelTimeRouter};
use ms_perception::{DriverPerception, SignalObservation, TrafficColor};
use rustc_hash::FxHashMap;

use crate::buffer::Shared;
use crate::demand::Trip;
use crate::error::SimResult;
use crate::neighbors::{query, LaneIndex, QueryOrigin, VisibilityEnvelope};
use crate::observer::SimObserver;

// ── Stats ─────────────────────────────────────────────────────────────────────

/// Run counters, updated as drivers enter and leave.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimStats {
    pub dispatched: usize,
    pub completed: usize,
    /// Trips dropped because no route survived network loading.
    pub dropped_no_path: usize,
}

// ── Pre-collected per-driver inputs ───────────────────────────────────────────

/// Assembled sequentially before the (potentially parallel) update phase so
/// that phase reads only immutable shared state.
struct PreInput {
    neighbors: NeighborSet,
    messages: Vec<Envelope>,
    signal: Option<SignalObservation>,
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Fixed-tick work loop over all driver agents.
///
/// Phases per tick:
///
/// 1. **Dispatch** — promote pending trips whose start time has arrived.
/// 2. **Update** — every active driver's `frame_tick`, reading neighbor
///    state from the tick T−1 buffers (parallel with the `parallel`
///    feature).
/// 3. **Flip** — swap all double-buffered observables.
/// 4. **Deliver** — drain the message bus: intersection managers process
///    their request batches and their replies are routed to driver inboxes
///    in the same tick.
/// 5. **Reap** — remove drivers flagged `to_be_removed`.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Scheduler {
    pub config: SimConfig,
    pub clock: SimClock,
    pub network: RoadNetwork,
    pub models: DriverModels,
    pub envelope: VisibilityEnvelope,
    pub stats: SimStats,

    /// Driver arena; reaped slots become `None` and ids stay stable.
    drivers: Vec<Option<DriverAgent>>,
    rngs: Vec<DriverRng>,
    observables: Vec<Shared<Option<DriverObservable>>>,

    /// Trips keyed by their dispatch tick.
    pending: BTreeMap<Tick, Vec<Trip>>,
    /// Messages delivered to drivers at the end of tick T, read at T+1.
    inboxes: FxHashMap<DriverId, Vec<Envelope>>,
    bus: MessageBus,
    managers: BTreeMap<NodeId, IntersectionManager>,
    /// Signal heads by governed segment; the stop line is the segment end.
    signals: FxHashMap<SegmentId, TrafficColor>,

    /// Retention horizon of the perception buffers, ms.
    max_reaction_ms: u64,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: SimConfig,
        network: RoadNetwork,
        models: DriverModels,
        managers: BTreeMap<NodeId, IntersectionManager>,
        pending: BTreeMap<Tick, Vec<Trip>>,
        envelope: VisibilityEnvelope,
        max_reaction_ms: u64,
    ) -> Self {
        Self {
            clock: config.make_clock(),
            config,
            network,
            models,
            envelope,
            stats: SimStats::default(),
            drivers: Vec::new(),
            rngs: Vec::new(),
            observables: Vec::new(),
            pending,
            inboxes: FxHashMap::default(),
            bus: MessageBus::new(),
            managers,
            signals: FxHashMap::default(),
            max_reaction_ms,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current tick to `config.end_tick()`.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        while self.clock.current_tick < self.config.end_tick() {
            self.step(observer)?;
        }
        observer.on_sim_end(self.clock.current_tick);
        Ok(())
    }

    /// Run exactly `n` ticks from the current position.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.step(observer)?;
        }
        Ok(())
    }

    fn step<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let now = self.clock.current_tick;
        observer.on_tick_start(now);
        let active = self.process_tick(now, observer)?;
        observer.on_tick_end(now, active);
        if self.config.output_interval_ticks > 0
            && now.0.is_multiple_of(self.config.output_interval_ticks)
        {
            let snapshot: Vec<Option<DriverObservable>> =
                self.observables.iter().map(Shared::get).collect();
            observer.on_snapshot(now, &snapshot);
        }
        self.clock.advance();
        Ok(())
    }

    /// Install (or change) a signal head on a segment's stop line.
    ///
    /// Returns `false` if the external segment id is unknown.
    pub fn set_signal(&mut self, segment_ext: u64, color: TrafficColor) -> bool {
        match self.network.segment_by_ext(segment_ext) {
            Some(seg) => {
                self.signals.insert(seg, color);
                true
            }
            None => false,
        }
    }

    /// Read-only access to a driver slot (tests and output writers).
    pub fn driver(&self, id: DriverId) -> Option<&DriverAgent> {
        self.drivers.get(id.index()).and_then(Option::as_ref)
    }

    /// The tick T−1 observable of a driver slot.
    pub fn observable(&self, id: DriverId) -> Option<DriverObservable> {
        self.observables.get(id.index()).and_then(Shared::get)
    }

    pub fn active_count(&self) -> usize {
        self.drivers.iter().filter(|d| d.is_some()).count()
    }

    // ── Phases ────────────────────────────────────────────────────────────

    fn process_tick<O: SimObserver>(&mut self, now: Tick, observer: &mut O) -> SimResult<usize> {
        // ── Phase 1: dispatch ─────────────────────────────────────────────
        self.dispatch(now);

        // ── Phase 2: update ───────────────────────────────────────────────
        let person_ticks = self.config.granularities.person_ticks as u64;
        let active = if now.0.is_multiple_of(person_ticks) {
            self.update_drivers()?
        } else {
            0
        };

        // ── Phase 3: flip ─────────────────────────────────────────────────
        for obs in &mut self.observables {
            obs.flip();
        }

        // ── Phase 4: deliver ──────────────────────────────────────────────
        self.deliver(now);

        // ── Phase 5: reap ─────────────────────────────────────────────────
        for i in 0..self.drivers.len() {
            let remove = matches!(&self.drivers[i], Some(d) if d.to_be_removed);
            if remove {
                self.drivers[i] = None;
                self.observables[i].force(None);
                self.inboxes.remove(&DriverId(i as u32));
                self.stats.completed += 1;
                observer.on_driver_removed(now, DriverId(i as u32));
            }
        }

        Ok(active)
    }

    fn dispatch(&mut self, now: Tick) {
        let due: Vec<Tick> = self
            .pending
            .range(..=now)
            .map(|(&t, _)| t)
            .collect();
        let mut deferred = Vec::new();
        for t in due {
            for trip in self.pending.remove(&t).unwrap() {
                if let Some(blocked) = self.dispatch_trip(trip) {
                    deferred.push(blocked);
                }
            }
        }
        // Entry blocked this tick: the trip waits in its virtual queue and
        // is re-tried next tick.
        if !deferred.is_empty() {
            self.pending.entry(now.offset(1)).or_default().extend(deferred);
        }
    }

    /// `true` when the head of `segment`'s entry lane is still occupied.
    fn entry_blocked(&self, segment: SegmentId, clear_m: f64) -> bool {
        self.drivers.iter().flatten().any(|d| {
            !d.path.is_done()
                && !d.path.in_intersection()
                && d.path.current_segment() == segment
                && d.path.lane_index() == 0
                && d.path.dist_along_segment() < clear_m
        })
    }

    /// Returns the trip back when the entry area is occupied.
    fn dispatch_trip(&mut self, trip: Trip) -> Option<Trip> {
        let id = DriverId(self.drivers.len() as u32);

        let (Some(origin), Some(dest)) = (
            self.network.node_by_ext(trip.origin_ext),
            self.network.node_by_ext(trip.destination_ext),
        ) else {
            log::warn!(
                "dropping trip {} -> {}: unknown node",
                trip.origin_ext,
                trip.destination_ext
            );
            self.stats.dropped_no_path += 1;
            return None;
        };

        let segments = match TravelTimeRouter.route(&self.network, origin, dest) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) | Err(_) => {
                log::warn!(
                    "dropping trip {} -> {}: no path",
                    trip.origin_ext,
                    trip.destination_ext
                );
                self.stats.dropped_no_path += 1;
                return None;
            }
        };

        // Hold the trip back while a vehicle still occupies the entry area
        // of its first segment.
        let clear_m = Vehicle::new(trip.vehicle).length_m() + 2.0;
        if self.entry_blocked(segments[0], clear_m) {
            return Some(trip);
        }

        let mut rng = DriverRng::new(self.config.seed, id);
        let delay = rng.reaction_time_ms(&self.config.reaction_time, self.max_reaction_ms);
        let perception = DriverPerception::new(Millis(self.max_reaction_ms), Millis(delay));

        let path = match PathMover::new(&self.network, segments, 0) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("dropping trip: {e}");
                self.stats.dropped_no_path += 1;
                return None;
            }
        };

        let role = match trip.vehicle {
            VehicleType::Bus => Role::BusDriver(Default::default()),
            _ => Role::Driver,
        };
        let agent = DriverAgent::new(
            id,
            Vehicle::new(trip.vehicle),
            path,
            perception,
            role,
            trip.desired_speed,
        );

        self.drivers.push(Some(agent));
        self.rngs.push(rng);
        self.observables
            .push(Shared::new(self.config.mutex_strategy, None));
        self.stats.dispatched += 1;
        None
    }

    fn update_drivers(&mut self) -> SimResult<usize> {
        let person_ticks = self.config.granularities.person_ticks as u64;
        let dt = Seconds(self.clock.tick_secs().0 * person_ticks as f64);
        let now_ms = self.clock.now_ms();

        // Tick T−1 snapshot and the per-lane index built from it.
        let snapshot: Vec<Option<DriverObservable>> =
            self.observables.iter().map(Shared::get).collect();
        let lane_index = LaneIndex::build(&snapshot);

        // ── Pre-collect per-driver inputs (sequential) ────────────────────
        let inputs: Vec<Option<PreInput>> = (0..self.drivers.len())
            .map(|i| {
                let agent = self.drivers[i].as_ref()?;
                if agent.to_be_removed {
                    return None;
                }
                let id = DriverId(i as u32);
                let messages = self.inboxes.remove(&id).unwrap_or_default();

                let (neighbors, signal) = if agent.path.in_intersection() || agent.path.is_done() {
                    (NeighborSet::default(), None)
                } else {
                    let seg = agent.path.current_segment();
                    let next_link_segment = agent.path.next_segment().filter(|&n| {
                        self.network.segment(n).link != self.network.segment(seg).link
                    });
                    let origin = QueryOrigin {
                        me: id,
                        segment: seg,
                        lane_index: agent.path.lane_index(),
                        offset: agent.path.dist_along_segment(),
                        length: agent.vehicle.length_m(),
                        dist_to_segment_end: agent.path.dist_to_segment_end(),
                        next_link_segment,
                    };
                    let neighbors = query(&self.network, &lane_index, &origin, self.envelope);
                    let signal = self.signals.get(&seg).map(|&color| SignalObservation {
                        color,
                        distance: agent.path.dist_to_segment_end(),
                    });
                    (neighbors, signal)
                };

                Some(PreInput {
                    neighbors,
                    messages,
                    signal,
                })
            })
            .collect();

        // ── Update phase ──────────────────────────────────────────────────
        let outputs = self.run_frames(now_ms, dt, inputs)?;

        // ── Apply (sequential, ascending DriverId for determinism) ────────
        let mut active = 0;
        for (i, output) in outputs.into_iter().enumerate() {
            let Some(output) = output else { continue };
            active += 1;
            self.observables[i].set(Some(output.observable));
            let from = Recipient::Driver(DriverId(i as u32));
            for (to, msg) in output.outgoing {
                self.bus.post(from, to, msg);
            }
        }
        Ok(active)
    }

    #[cfg(not(feature = "parallel"))]
    fn run_frames(
        &mut self,
        now_ms: Millis,
        dt: Seconds,
        inputs: Vec<Option<PreInput>>,
    ) -> SimResult<Vec<Option<ms_driver::FrameOutput>>> {
        let network = &self.network;
        let models = &self.models;
        let mut outputs = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.into_iter().enumerate() {
            let Some(pre) = input else {
                outputs.push(None);
                continue;
            };
            let agent = self.drivers[i].as_mut().expect("input implies live driver");
            let out = agent.frame_tick(
                FrameInput {
                    network,
                    models,
                    now: now_ms,
                    dt,
                    neighbors: pre.neighbors,
                    messages: pre.messages,
                    signal: pre.signal,
                },
                &mut self.rngs[i],
            )?;
            outputs.push(Some(out));
        }
        Ok(outputs)
    }

    #[cfg(feature = "parallel")]
    fn run_frames(
        &mut self,
        now_ms: Millis,
        dt: Seconds,
        inputs: Vec<Option<PreInput>>,
    ) -> SimResult<Vec<Option<ms_driver::FrameOutput>>> {
        use rayon::prelude::*;

        // Move the arenas out so the parallel closure borrows only immutable
        // scheduler state (network, models).
        let mut drivers = std::mem::take(&mut self.drivers);
        let mut rngs = std::mem::take(&mut self.rngs);
        let network = &self.network;
        let models = &self.models;

        let results: Vec<Option<ms_driver::DriverResult<ms_driver::FrameOutput>>> = drivers
            .par_iter_mut()
            .zip(rngs.par_iter_mut())
            .zip(inputs.into_par_iter())
            .map(|((driver, rng), input)| {
                let pre = input?;
                let agent = driver.as_mut().expect("input implies live driver");
                Some(agent.frame_tick(
                    FrameInput {
                        network,
                        models,
                        now: now_ms,
                        dt,
                        neighbors: pre.neighbors,
                        messages: pre.messages,
                        signal: pre.signal,
                    },
                    rng,
                ))
            })
            .collect();

        self.drivers = drivers;
        self.rngs = rngs;

        results
            .into_iter()
            .map(|r| r.transpose().map_err(Into::into))
            .collect()
    }

    /// Drain the bus: managers first, then their same-tick replies into
    /// driver inboxes (read at the start of the next tick's update).
    fn deliver(&mut self, now: Tick) {
        let now_sec = self.clock.now_secs().0;

        self.bus.begin_delivery(now);
        let mut replies: Vec<(Recipient, Recipient, Message)> = Vec::new();
        for to in self.bus.recipients() {
            let batch = self.bus.drain(to);
            match to {
                Recipient::Intersection(node) => match self.managers.get_mut(&node) {
                    Some(mgr) => {
                        for (dest, msg) in mgr.process(now_sec, &batch, &self.network) {
                            replies.push((to, dest, msg));
                        }
                    }
                    None => log::warn!("no intersection manager at {node}"),
                },
                Recipient::Driver(d) => {
                    self.inboxes.entry(d).or_default().extend(batch);
                }
                // Bus-stop and conflux collaborators live outside the core.
                Recipient::BusStop(_) | Recipient::Conflux(_) => {}
            }
        }

        if !replies.is_empty() {
            for (from, to, msg) in replies {
                self.bus.post(from, to, msg);
            }
            self.bus.begin_delivery(now);
            for to in self.bus.recipients() {
                let batch = self.bus.drain(to);
                if let Recipient::Driver(d) = to {
                    self.inboxes.entry(d).or_default().extend(batch);
                }
            }
        }
    }
}
