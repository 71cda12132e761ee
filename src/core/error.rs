//! Error types for RVM implementation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, RVMError>;
