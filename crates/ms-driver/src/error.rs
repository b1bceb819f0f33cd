use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Route request produced no usable path.  Recoverable: the driver is
    /// removed with its trip reported incomplete.
    #[error("no path: {0}")]
    NoPath(String),

    /// Path-mover invariant violations are programmer errors and fatal.
    #[error("advance called after the path was completed")]
    AdvancePastEnd,

    #[error("leaveIntersection called while not inside an intersection")]
    NotInIntersection,

    #[error("lane index {index} out of range (segment has {count} lanes)")]
    LaneOutOfRange { index: usize, count: usize },

    #[error("lane shift attempted inside an intersection")]
    ShiftInIntersection,

    #[error(transparent)]
    Perception(#[from] ms_perception::PerceptionError),
}

pub type DriverResult<T> = Result<T, DriverError>;
