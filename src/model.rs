use crate::error::Result;
use crate::proto::GraphProto;
use crate::signature::ValueSignature;
use crate::tensor::Tensor;

pub trait Module {
    fn forward(&self, input: &Tensor) -> Result<Tensor>;
}

/// A module that can describe its forward pass as an ONNX graph.
pub trait Export: Module {
    fn to_graph(&self, input: &ValueSignature, output: &ValueSignature) -> Result<GraphProto>;
}
