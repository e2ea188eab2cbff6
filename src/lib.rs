//! Export and run a float32 vector-doubling model in the ONNX format.
//!
//! [`export_model`] writes an [`Export`] module to disk and validates the
//! file; [`InferenceSession`] loads it back into ONNX Runtime on the first
//! working [`ExecutionProvider`].

pub mod checker;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod model;
pub mod proto;
pub mod provider;
pub mod scale;
pub mod session;
pub mod signature;
pub mod tensor;

pub use error::{Error, Result};
pub use export::{ExportOptions, ExportReport, export_model};
pub use model::{Export, Module};
pub use provider::ExecutionProvider;
pub use scale::Scale;
pub use session::{InferenceSession, SessionOptions};
pub use signature::{Dim, ValueSignature};
pub use tensor::{ElemType, Tensor, TensorData};
