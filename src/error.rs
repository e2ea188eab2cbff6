use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error at byte {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported operator: {domain}::{op_type}")]
    UnsupportedOp { domain: String, op_type: String },

    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    #[error("{len} elements cannot fill shape {shape:?}")]
    ElementCount { shape: Vec<usize>, len: usize },

    #[error("Missing input: '{0}'")]
    MissingInput(String),

    #[error("Unknown input: '{0}'")]
    UnknownInput(String),

    #[error("Type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Shape mismatch for '{name}': expected {expected}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: String,
        actual: Vec<usize>,
    },

    #[error("Exported model disagrees with the module: expected {expected:?}, got {actual:?}")]
    ParityMismatch { expected: Vec<f32>, actual: Vec<f32> },

    #[error("No execution provider available")]
    NoExecutionProvider,

    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

impl Error {
    pub(crate) fn decode(offset: usize, reason: impl Into<String>) -> Self {
        Error::Decode {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(reason.into())
    }
}
