//! Error types shared by the modelling backends.

use thiserror::Error;

/// Errors raised while parsing a circuit artifact or building a model.
/// All of them are fatal for the containing run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed circuit artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown read target '{name}'")]
    UnknownReadTarget { name: String },

    #[error("unknown lookup table '{name}'")]
    UnknownLookupTable { name: String },

    #[error("lookup table '{name}' must have non-zero input and output widths")]
    InvalidTableShape { name: String },

    #[error("lookup into table '{table}' has {got} inputs, expected {expected}")]
    LookupArity {
        table: String,
        expected: usize,
        got: usize,
    },

    #[error("ANF coordinate {index} out of range for table '{table}'")]
    CoordinateOutOfRange { table: String, index: usize },

    #[error("read target '{target}' has no update expression for bit {offset}")]
    MissingUpdateExpression { target: String, offset: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("points and inequalities must not be empty")]
    EmptyReduction,

    #[error("failed to reduce inequalities: insufficient separating power")]
    InsufficientSeparatingPower,
}

pub type Result<T> = std::result::Result<T, Error>;
