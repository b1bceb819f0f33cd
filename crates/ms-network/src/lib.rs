//! `ms-network` — immutable lane-accurate road network.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`geometry`] | `Point`, `PolyLine` with cumulative-length interpolation  |
//! | [`entities`] | `Node`, `Link`, `RoadSegment`, `Lane`, turnings, obstacles |
//! | [`network`]  | frozen `RoadNetwork` arenas + lookup maps + spatial index |
//! | [`builder`]  | `RoadNetworkBuilder` — resolves external ids, drops dangling references with a warning |
//! | [`router`]   | `Router` trait + travel-time Dijkstra over links          |
//! | [`loader`]   | `NetworkLoader` seam for external import sources          |
//!
//! # Design notes
//!
//! Topology is cyclic (lane ↔ segment ↔ link ↔ node), so entities live in
//! arenas keyed by dense typed ids and back-links are stored as ids resolved
//! through `RoadNetwork` accessors.  All mutation happens inside the builder;
//! after `build()` the graph is frozen and may be shared freely across
//! worker threads.

pub mod builder;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod network;
pub mod router;


pub use builder::{
    RawConflict, RawConnector, RawLane, RawLink, RawNode, RawObstacle, RawObstacleKind,
    RawSegment, RawTurningGroup, RawTurningPath, RoadNetworkBuilder,
};
pub use entities::{
    BusStop, Lane, LaneConnector, Link, LinkType, Node, NodeType, RoadItem, RoadSegment,
    TurningConflict, TurningGroup, TurningPath,
};
pub use error::{NetworkError, NetworkResult};
pub use geometry::{Point, PolyLine};
pub use loader::NetworkLoader;
pub use network::RoadNetwork;
pub use router::{Router, TravelTimeRouter};
