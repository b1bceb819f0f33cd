//! `ms-msg` — the typed in-process message bus.
//!
//! Two delivery modes:
//!
//! - **Instantaneous**: posted during tick T's update phase, delivered after
//!   all agents have updated in T but before T+1's update phase.  A sender
//!   never observes its own send mid-tick.
//! - **Deferred**: posted with an offset of N ticks, delivered alongside the
//!   instantaneous messages of tick T+N.
//!
//! Delivery order is deterministic: recipients are drained in ascending
//! `Recipient` order, and messages per recipient in post order (FIFO).  The
//! scheduler owns the drain loop; handlers never post back into the queue
//! being drained (posts during delivery land in the next tick's batch).

use std::collections::BTreeMap;

use ms_core::{BusStopId, DriverId, NodeId, SegmentId, Tick, TurningPathId};

#[cfg(test)]
mod tests;

// ── Addresses ─────────────────────────────────────────────────────────────────

/// Anything that can receive messages.
///
/// `Ord` gives the deterministic delivery order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Recipient {
    Driver(DriverId),
    Intersection(NodeId),
    BusStop(BusStopId),
    /// The mesoscopic collaborator owning a segment (incident insertion).
    Conflux(SegmentId),
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Driver → IntersectionManager: ask for an arrival slot at the stop
    /// line of `turning_path`.
    RequestIntArrTime {
        driver: DriverId,
        turning_path: TurningPathId,
        requested_sec: f64,
    },

    /// IntersectionManager → Driver: the granted arrival time.
    ReplyIntArrTime { granted_sec: f64 },

    /// BusDriver → BusStopAgent: bus at the stop, doors open.
    BusArrival { driver: DriverId, stop: BusStopId },

    /// BusDriver → BusStopAgent: dwell over, bus rejoins the lane.
    BusDeparture { driver: DriverId, stop: BusStopId },

    /// BusStopAgent → BusDriver: passengers boarding.
    BoardBus { count: u32 },

    /// BusStopAgent → BusDriver: passengers alighting.
    AlightBus { count: u32 },

    /// External → conflux: capacity change on a segment.
    InsertIncident {
        segment: SegmentId,
        new_flow_rate: f64,
    },
}

/// A message together with its sender.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub from: Recipient,
    pub msg: Message,
}

// ── MessageBus ────────────────────────────────────────────────────────────────

/// Per-recipient FIFO queues, flipped once per tick by the scheduler.
///
/// `post` targets the *pending* batch; [`MessageBus::begin_delivery`] freezes
/// pending into the deliverable batch (merging any deferred messages now
/// due), so posts made while handlers run are naturally pushed to the next
/// tick.
#[derive(Default)]
pub struct MessageBus {
    pending: BTreeMap<Recipient, Vec<Envelope>>,
    deliverable: BTreeMap<Recipient, Vec<Envelope>>,
    deferred: BTreeMap<Tick, Vec<(Recipient, Envelope)>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `msg` for delivery at the end of the current tick.
    pub fn post(&mut self, from: Recipient, to: Recipient, msg: Message) {
        self.pending
            .entry(to)
            .or_default()
            .push(Envelope { from, msg });
    }

    /// Queue `msg` for delivery `offset_ticks` ticks after `now`.
    ///
    /// An offset of 0 is equivalent to [`MessageBus::post`].
    pub fn post_deferred(
        &mut self,
        from: Recipient,
        to: Recipient,
        msg: Message,
        now: Tick,
        offset_ticks: u64,
    ) {
        if offset_ticks == 0 {
            self.post(from, to, msg);
        } else {
            self.deferred
                .entry(now.offset(offset_ticks))
                .or_default()
                .push((to, Envelope { from, msg }));
        }
    }

    /// Freeze the current batch for delivery: everything posted during tick
    /// `now` plus all deferred messages due at or before `now`.
    pub fn begin_delivery(&mut self, now: Tick) {
        debug_assert!(self.deliverable.is_empty(), "previous batch not drained");
        self.deliverable = std::mem::take(&mut self.pending);

        let due: Vec<Tick> = self
            .deferred
            .range(..=now)
            .map(|(&t, _)| t)
            .collect();
        for t in due {
            for (to, env) in self.deferred.remove(&t).unwrap() {
                self.deliverable.entry(to).or_default().push(env);
            }
        }
    }

    /// Recipients with messages in the frozen batch, in delivery order.
    pub fn recipients(&self) -> Vec<Recipient> {
        self.deliverable.keys().copied().collect()
    }

    /// Drain the frozen queue of one recipient (FIFO order).
    pub fn drain(&mut self, to: Recipient) -> Vec<Envelope> {
        self.deliverable.remove(&to).unwrap_or_default()
    }

    /// Messages waiting in the *pending* batch (not yet frozen).
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Deferred messages not yet due.
    pub fn deferred_len(&self) -> usize {
        self.deferred.values().map(Vec::len).sum()
    }
}
