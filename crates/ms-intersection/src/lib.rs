//! `ms-intersection` — the per-intersection slot arbiter.
//!
//! Drivers approaching a non-merge node request an arrival time at the stop
//! line of their turning path; the manager grants the earliest feasible time
//! that keeps every pair of conflicting turning paths separated by the
//! conflict's minimum separation.  Requests are served in FIFO order of
//! arrival (stable under equal requested times), which is what makes runs
//! reproducible; a right-of-way turning is served before a yielding one only
//! when both ask for the same instant.

use ms_core::{CoreResult, DriverId, NodeId, ParameterManager, TurningPathId};
use ms_msg::{Envelope, Message, Recipient};
use ms_network::RoadNetwork;

#[cfg(test)]
mod tests;

// ── Grants ────────────────────────────────────────────────────────────────────

/// An outstanding arrival-time grant.
#[derive(Copy, Clone, Debug)]
struct Grant {
    driver: DriverId,
    turning_path: TurningPathId,
    access_sec: f64,
}

// ── IntersectionManager ───────────────────────────────────────────────────────

pub struct IntersectionManager {
    pub node: NodeId,
    /// Separation = max(traversal times) × factor, floored.
    separation_factor: f64,
    separation_floor_sec: f64,
    /// Speed used to estimate turning-path traversal times, m/s.
    turning_speed: f64,
    grants: Vec<Grant>,
}

impl IntersectionManager {
    pub fn new(node: NodeId, pm: &ParameterManager) -> CoreResult<Self> {
        Ok(Self {
            node,
            separation_factor: pm.param_f64("int_separation_factor")?,
            separation_floor_sec: pm.param_f64("int_separation_floor_s")?,
            turning_speed: pm.param_f64("int_turning_speed_mps")?,
            grants: Vec::new(),
        })
    }

    /// Minimum separation between two conflicting turnings, seconds.
    fn separation_sec(&self, network: &RoadNetwork, a: TurningPathId, b: TurningPathId) -> f64 {
        let ta = network.turning_path(a).length().0 / self.turning_speed;
        let tb = network.turning_path(b).length().0 / self.turning_speed;
        (ta.max(tb) * self.separation_factor).max(self.separation_floor_sec)
    }

    /// Serve one tick's batch of access requests.
    ///
    /// Returns the `ReplyIntArrTime` messages to post back, in request order.
    /// Non-request messages in the batch are ignored with a warning.
    pub fn process(
        &mut self,
        now_sec: f64,
        batch: &[Envelope],
        network: &RoadNetwork,
    ) -> Vec<(Recipient, Message)> {
        // Grants whose holder has long passed are dead; drop them so the
        // grant list stays proportional to the approach queue.
        self.grants
            .retain(|g| g.access_sec + 4.0 * self.separation_floor_sec >= now_sec);

        // Collect requests preserving arrival order.
        let mut requests: Vec<(usize, DriverId, TurningPathId, f64)> = Vec::new();
        for (seq, env) in batch.iter().enumerate() {
            match &env.msg {
                Message::RequestIntArrTime {
                    driver,
                    turning_path,
                    requested_sec,
                } => requests.push((seq, *driver, *turning_path, *requested_sec)),
                other => {
                    log::warn!("intersection {} ignoring message {other:?}", self.node);
                }
            }
        }

        // Requested time first; right-of-way breaks exact ties; FIFO last.
        requests.sort_by(|a, b| {
            a.3.partial_cmp(&b.3)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    right_of_way_rank(network, a.2).cmp(&right_of_way_rank(network, b.2))
                })
                .then(a.0.cmp(&b.0))
        });

        let mut replies = Vec::with_capacity(requests.len());
        for (_, driver, turning_path, requested_sec) in requests {
            // A re-request supersedes the driver's previous grant.
            self.grants.retain(|g| g.driver != driver);

            let mut access = requested_sec;
            for g in &self.grants {
                if network.conflict_between(turning_path, g.turning_path).is_some() {
                    let sep = self.separation_sec(network, turning_path, g.turning_path);
                    if access < g.access_sec + sep {
                        access = g.access_sec + sep;
                    }
                }
            }

            self.grants.push(Grant {
                driver,
                turning_path,
                access_sec: access,
            });
            replies.push((
                Recipient::Driver(driver),
                Message::ReplyIntArrTime { granted_sec: access },
            ));
        }
        replies
    }

    /// The holder of `driver`'s current grant has cleared the intersection.
    pub fn release(&mut self, driver: DriverId) {
        self.grants.retain(|g| g.driver != driver);
    }

    /// Outstanding grant count (for tests and metrics observers).
    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }
}

/// 0 when `path` holds right-of-way in at least one of its conflicts,
/// 1 otherwise — only consulted to break exact requested-time ties.
fn right_of_way_rank(network: &RoadNetwork, path: TurningPathId) -> u8 {
    let tp = network.turning_path(path);
    let holds = tp.conflicts.iter().any(|(_, &idx)| {
        let c = &network.conflicts[idx as usize];
        (c.first == path) == (c.priority > 0)
    });
    u8::from(!holds)
}
