//! Error types for the simulation core.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SphError {
    #[error("unrecognized kernel type: {0}")]
    InvalidKernelType(String),

    #[error("unrecognized solver type: {0}")]
    UnknownSolverType(String),

    #[error("unsupported spatial dimension: {0} (only 1-3 are supported)")]
    UnsupportedDimension(usize),

    #[error("neighbor search invoked on an empty particle set")]
    EmptyParticleSet,

    #[error("support radius must be positive; got {0}")]
    ZeroSupportRadius(f64),

    #[error("particle index {index} out of bounds for a set of {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, SphError>;
