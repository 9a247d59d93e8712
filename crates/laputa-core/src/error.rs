//! Error types shared across the engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::persistence::DocumentError;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum LaputaError {
    /// A statistics block was addressed with a dimension it does not have
    #[error("invalid dimension {dimension} for a {dims}-dimensional block")]
    InvalidDimension { dimension: usize, dims: usize },

    /// An index fell outside its container
    #[error("index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Batch stage count outside 1..=MAX_STAGES
    #[error("stage count {0} is outside the supported range")]
    StageCount(u32),

    /// A batch run was started without a template society
    #[error("batch has no template society")]
    MissingTemplate,

    /// A buffer could not be reserved
    #[error("could not allocate {0} statistics values")]
    Allocation(usize),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, LaputaError>;
