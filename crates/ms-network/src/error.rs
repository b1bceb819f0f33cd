use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("network load error: {0}")]
    Load(String),

    #[error("no path from node {from} to node {to}")]
    NoPath { from: u64, to: u64 },

    #[error("unknown external node id {0}")]
    UnknownNode(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
