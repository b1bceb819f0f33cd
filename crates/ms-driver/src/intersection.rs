//! Driver-side slot-based intersection driving.
//!
//! Approach protocol:
//!
//! 1. While approaching a non-merge node, post one `RequestIntArrTime` with
//!    the arrival time the current speed predicts (`request_sent` latches).
//! 2. On `ReplyIntArrTime`, hold the granted time.  Each tick before the
//!    grant, speed is overridden to `dist / (access − now)` with zero
//!    acceleration so the vehicle crosses the stop line exactly on time.
//! 3. A driver that reaches the stop line without a grant halts and
//!    re-requests with a fresh arrival estimate.
//! 4. Inside the intersection the turning polyline is followed at a speed
//!    capped by the turning's curvature; on exit the latch clears for the
//!    next intersection.

use ms_behavior::DriverUpdateParams;
use ms_core::{DriverId, NodeId, TurningPathId};
use ms_msg::{Message, Recipient};
use ms_network::PolyLine;

/// Distance from the stop line at which the slot request goes out, metres.
pub const REQUEST_DISTANCE: f64 = 150.0;

/// Below this remaining distance an ungranted driver halts at the line.
const STOP_LINE_TOLERANCE: f64 = 1.0;

/// Floor speed used when predicting the arrival time from a near-standstill.
const MIN_PREDICT_SPEED: f64 = 1.0;

// ── Slot state ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ApproachPhase {
    #[default]
    Cruising,
    Approaching,
    Inside,
}

/// Per-driver latch for the request/reply protocol.
#[derive(Clone, Debug, Default)]
pub struct SlotDriving {
    pub phase: ApproachPhase,
    pub request_sent: bool,
}

/// The speed/acceleration override produced by the slot model.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum SlotAction {
    /// No constraint this tick.
    None,
    /// Hold exactly this speed with zero acceleration.
    HoldSpeed(f64),
    /// Halt at the stop line (no grant yet).
    Halt,
}

impl SlotDriving {
    /// Run one tick of the approach protocol.
    ///
    /// `dist_to_int` is the distance to the stop line; `turning` the path
    /// the driver will take.  Any message to post is pushed onto `out`.
    pub fn approach(
        &mut self,
        p: &mut DriverUpdateParams,
        driver: DriverId,
        node: NodeId,
        turning: TurningPathId,
        dist_to_int: f64,
        speed: f64,
        out: &mut Vec<(Recipient, Message)>,
    ) -> SlotAction {
        self.phase = ApproachPhase::Approaching;

        if !self.request_sent {
            let predict = speed.max(MIN_PREDICT_SPEED);
            let arrival = p.now_sec + dist_to_int / predict;
            out.push((
                Recipient::Intersection(node),
                Message::RequestIntArrTime {
                    driver,
                    turning_path: turning,
                    requested_sec: arrival,
                },
            ));
            self.request_sent = true;
            p.is_response_received = false;
            // Provisional until the manager replies.
            p.access_time = arrival;
        }

        if p.is_response_received {
            let remaining = p.access_time - p.now_sec;
            if remaining > 0.0 {
                p.use_int_acc = true;
                return SlotAction::HoldSpeed(dist_to_int / remaining);
            }
            // The granted instant has passed: resume normal control and
            // enter on the car-following model's terms.
            return SlotAction::None;
        }

        // No grant yet.  Hold the line and ask again next tick if we are
        // already on top of it.
        if dist_to_int <= STOP_LINE_TOLERANCE {
            self.request_sent = false;
            return SlotAction::Halt;
        }
        SlotAction::None
    }

    /// Record the manager's reply.
    pub fn on_reply(&mut self, p: &mut DriverUpdateParams, granted_sec: f64) {
        p.access_time = granted_sec;
        p.is_response_received = true;
    }

    /// Crossing the stop line into the intersection.
    pub fn enter(&mut self) {
        self.phase = ApproachPhase::Inside;
    }

    /// Clearing the intersection: reset the latch for the next one.
    pub fn exit(&mut self, p: &mut DriverUpdateParams) {
        self.phase = ApproachPhase::Cruising;
        self.request_sent = false;
        p.is_response_received = false;
        p.use_int_acc = false;
    }
}

// ── Turn speed ────────────────────────────────────────────────────────────────

/// Speed cap for traversing `turning`, from its tightest curvature:
/// `v = sqrt(a_lat · R)`, with `R` estimated per interior polypoint from the
/// turn angle between adjacent edges.  Straight paths return `fallback`.
pub fn turn_speed_cap(turning: &PolyLine, comfort_lat_acc: f64, fallback: f64) -> f64 {
    let pts = turning.points();
    let mut min_radius = f64::INFINITY;

    for w in pts.windows(3) {
        let (a, b, c) = (w[0], w[1], w[2]);
        let v1 = (b.x - a.x, b.y - a.y);
        let v2 = (c.x - b.x, c.y - b.y);
        let l1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
        let l2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
        if l1 <= 0.0 || l2 <= 0.0 {
            continue;
        }
        let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (l1 * l2)).clamp(-1.0, 1.0);
        let angle = cos.acos();
        if angle > 1e-3 {
            // Chord pair approximates an arc of radius len / angle.
            min_radius = min_radius.min(l1.min(l2) / angle);
        }
    }

    if min_radius.is_finite() {
        (comfort_lat_acc * min_radius).sqrt().min(fallback)
    } else {
        fallback
    }
}
