use ms_core::Millis;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceptionError {
    /// The perception clock must be monotone; a regressing `update` is a
    /// programmer error and fatal.
    #[error("perception clock moved backwards: was {was}, got {got}")]
    TimeRegression { was: Millis, got: Millis },
}

pub type PerceptionResult<T> = Result<T, PerceptionError>;
