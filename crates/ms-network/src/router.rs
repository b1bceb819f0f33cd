//! Routing: node-to-node shortest paths expanded to segment sequences.
//!
//! Route *choice* is an external concern; the core only needs a precomputed
//! ordered segment list per driver.  This module provides the seam
//! ([`Router`]) plus a travel-time Dijkstra over links good enough for
//! demand loading and tests.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ms_core::{NodeId, SegmentId};

use crate::error::{NetworkError, NetworkResult};
use crate::network::RoadNetwork;

/// Computes a drivable segment sequence between two nodes.
pub trait Router {
    fn route(
        &self,
        network: &RoadNetwork,
        from: NodeId,
        to: NodeId,
    ) -> NetworkResult<Vec<SegmentId>>;
}

/// Dijkstra over the link graph weighted by free-flow travel time.
///
/// Costs are accumulated in integer microseconds so the priority queue has a
/// total order without floating-point comparators.
pub struct TravelTimeRouter;

impl TravelTimeRouter {
    /// Free-flow traversal cost of a link in µs.
    fn link_cost_us(network: &RoadNetwork, link: ms_core::LinkId) -> u64 {
        network
            .link(link)
            .segments
            .iter()
            .map(|&s| {
                let seg = network.segment(s);
                let v = seg.max_speed.0.max(1.0);
                (seg.length().0 / v * 1e6) as u64
            })
            .sum()
    }
}

impl Router for TravelTimeRouter {
    fn route(
        &self,
        network: &RoadNetwork,
        from: NodeId,
        to: NodeId,
    ) -> NetworkResult<Vec<SegmentId>> {
        if from == to {
            return Ok(Vec::new());
        }

        let n = network.node_count();

        // Out-link adjacency, built once per query.
        let mut out: Vec<Vec<ms_core::LinkId>> = vec![Vec::new(); n];
        for link in &network.links {
            if !link.segments.is_empty() {
                out[link.from_node.index()].push(link.id);
            }
        }

        let mut dist = vec![u64::MAX; n];
        let mut prev_link = vec![None; n];
        let mut heap = BinaryHeap::new();

        dist[from.index()] = 0;
        heap.push(Reverse((0u64, from)));

        while let Some(Reverse((d, node))) = heap.pop() {
            if node == to {
                break;
            }
            if d > dist[node.index()] {
                continue; // stale entry
            }
            for &link in &out[node.index()] {
                let nd = d + Self::link_cost_us(network, link);
                let next = network.link(link).to_node;
                if nd < dist[next.index()] {
                    dist[next.index()] = nd;
                    prev_link[next.index()] = Some(link);
                    heap.push(Reverse((nd, next)));
                }
            }
        }

        if dist[to.index()] == u64::MAX {
            return Err(NetworkError::NoPath {
                from: network.node(from).ext_id,
                to: network.node(to).ext_id,
            });
        }

        // Trace links backwards, then flatten into segments in travel order.
        let mut links = Vec::new();
        let mut cursor = to;
        while cursor != from {
            let link = prev_link[cursor.index()].expect("reachable node has a predecessor");
            links.push(link);
            cursor = network.link(link).from_node;
        }
        links.reverse();

        Ok(links
            .into_iter()
            .flat_map(|l| network.link(l).segments.iter().copied())
            .collect())
    }
}
