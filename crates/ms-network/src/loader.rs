//! The network-import seam.
//!
//! Importing from XML or relational sources is an external collaborator's
//! job; the core only requires *something* that yields an immutable
//! [`RoadNetwork`].  The application crate ships a CSV-backed implementation;
//! tests build networks programmatically through the builder.

use crate::error::NetworkResult;
use crate::network::RoadNetwork;

pub trait NetworkLoader {
    fn load(&self) -> NetworkResult<RoadNetwork>;
}
