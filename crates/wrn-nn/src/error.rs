use thiserror::Error;
use wrn_core::TensorError;

/// Errors raised while configuring, building or evaluating a network graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Residual branches differ: {left:?} vs {right:?}")]
    BranchMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("{op} expects {expected} input(s), got {got}")]
    Arity {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unknown node id {0}")]
    UnknownNode(usize),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
