//! Error types for objective computation.

use thiserror::Error;

use radfuse_core::{CoreError, Phase, Task};

use crate::metrics::MetricKind;

/// Errors surfaced by objective functions and the retrieval evaluator.
#[derive(Debug, Error)]
pub enum ObjectiveError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("No metric slot registered for {task}/{phase}/{kind:?}")]
    MetricSlot {
        phase: Phase,
        task: Task,
        kind: MetricKind,
    },

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Retrieval evaluation error: {0}")]
    Retrieval(String),
}

/// Result type alias for objective operations.
pub type ObjectiveResult<T> = Result<T, ObjectiveError>;
