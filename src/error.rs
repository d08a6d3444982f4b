use crate::dtype::DType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HybridError {
    #[error("Unknown backend '{name}'; active backends: [{}]", .active.join(", "))]
    UnknownBackend { name: String, active: Vec<String> },

    #[error("Backend '{0}' registered more than once")]
    DuplicateBackend(String),

    #[error("Backend '{0}' declares no allowed element types")]
    EmptyAllowedTypes(String),

    #[error("Unknown dtype '{0}'")]
    UnknownDType(String),

    #[error("DType {dtype} not allowed by backend '{backend}' (allowed: {allowed:?})")]
    DTypeNotAllowed {
        backend: String,
        dtype: DType,
        allowed: Vec<DType>,
    },

    #[error("Shape mismatch: shape {shape:?} has {elements} elements but data length is {len}")]
    ShapeDataMismatch {
        shape: Vec<usize>,
        elements: usize,
        len: usize,
    },

    #[error("Shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Shape inference failed: {0}")]
    ShapeInference(String),

    #[error("Missing argument '{0}'")]
    MissingArgument(String),

    #[error("Unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HybridError>;
