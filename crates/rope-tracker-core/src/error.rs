//! Error kinds per the tracker's error-handling design.
//!
//! Only [`TrackerError::InputShape`] and [`TrackerError::PostOptimizerInfeasible`]
//! are ever returned to a caller. Degenerate LLE rows, CPD numerical
//! degeneracy, and an empty filtered cloud are all recoverable internally and
//! are absorbed with a `tracing` log line rather than surfaced as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("input shape violation: {0}")]
    InputShape(String),

    #[error(
        "post-optimizer could not satisfy fixed-point and edge-length constraints simultaneously: {0}"
    )]
    PostOptimizerInfeasible(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
