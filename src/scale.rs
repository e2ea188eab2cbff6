// scale.rs
use candle_core::Device;

use crate::error::{Error, Result};
use crate::graph::GraphBuilder;
use crate::model::{Export, Module};
use crate::proto::GraphProto;
use crate::signature::ValueSignature;
use crate::tensor::Tensor;

/// Multiplies every element by a fixed factor: `f(x) = x * factor`.
pub struct Scale {
    pub factor: f32,
    pub device: Device,
}

impl Scale {
    pub fn new(factor: f32) -> Self {
        Self {
            factor,
            device: Device::Cpu,
        }
    }

    /// The module behind `double_vector.onnx`.
    pub fn doubling() -> Self {
        Self::new(2.0)
    }

    fn factor_tensor(&self, input: &Tensor) -> Tensor {
        Tensor::scalar(f64::from(self.factor), input.elem_type())
    }
}

impl Module for Scale {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let x = input.to_device(&self.device)?;
        let factor = self.factor_tensor(input).to_device(&self.device)?;
        let y = x.broadcast_mul(&factor)?;
        Tensor::from_candle(&y)
    }
}

impl Export for Scale {
    fn to_graph(&self, input: &ValueSignature, output: &ValueSignature) -> Result<GraphProto> {
        self.validate_signatures(input, output)?;

        let mut graph = GraphBuilder::new("main_graph");
        graph.add_input(input);
        let factor = graph.add_constant(&Tensor::scalar(f64::from(self.factor), input.elem_type));
        graph.add_node("Mul", &[input.name.as_str(), factor.as_str()], Some(output.name.as_str()));
        graph.add_output(output);
        Ok(graph.finish())
    }
}

impl Scale {
    fn validate_signatures(&self, input: &ValueSignature, output: &ValueSignature) -> Result<()> {
        if input.elem_type != output.elem_type {
            return Err(Error::TypeMismatch {
                name: output.name.clone(),
                expected: input.elem_type.to_string(),
                actual: output.elem_type.to_string(),
            });
        }
        // Elementwise: the output has exactly the input's shape.
        if input.dims != output.dims {
            return Err(Error::validation(format!(
                "output '{}' {} does not match input '{}' {}",
                output.name,
                output.shape_string(),
                input.name,
                input.shape_string()
            )));
        }
        if input.name == output.name {
            return Err(Error::validation(format!(
                "input and output share the name '{}'",
                input.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Dim;
    use crate::tensor::{ElemType, TensorData};

    fn batch(name: &str) -> ValueSignature {
        ValueSignature::new(name, ElemType::F32, vec![Dim::symbolic("batch_size")])
    }

    #[test]
    fn test_forward_doubles() {
        let out = Scale::doubling()
            .forward(&Tensor::vector(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_eq!(out, Tensor::vector(vec![2.0, 4.0, 6.0, 8.0]));
    }

    #[test]
    fn test_forward_keeps_shape_and_type() {
        let input = Tensor::new(TensorData::I64(vec![1, -2, 3, -4, 5, -6]), vec![2, 3]).unwrap();
        let out = Scale::doubling().forward(&input).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.data(), &TensorData::I64(vec![2, -4, 6, -8, 10, -12]));
    }

    #[test]
    fn test_forward_preserves_negative_zero() {
        let out = Scale::doubling().forward(&Tensor::vector(vec![-0.0])).unwrap();
        assert!(out.as_f32().unwrap()[0].is_sign_negative());
    }

    #[test]
    fn test_graph_layout() {
        let graph = Scale::doubling()
            .to_graph(&batch("input"), &batch("output"))
            .unwrap();
        let ops: Vec<&str> = graph.node.iter().map(|n| n.op_type.as_str()).collect();
        assert_eq!(ops, vec!["Constant", "Mul"]);
        assert_eq!(graph.node[1].input, vec!["input", "/Constant_output_0"]);
        assert_eq!(graph.node[1].output, vec!["output"]);
        assert_eq!(graph.input[0].name, "input");
        assert_eq!(graph.output[0].name, "output");
    }

    #[test]
    fn test_graph_rejects_mismatched_signatures() {
        let scale = Scale::doubling();
        let doubles = ValueSignature::new("output", ElemType::F64, vec![Dim::symbolic("batch_size")]);
        assert!(scale.to_graph(&batch("input"), &doubles).is_err());

        let fixed = ValueSignature::new("output", ElemType::F32, vec![Dim::Fixed(4)]);
        assert!(scale.to_graph(&batch("input"), &fixed).is_err());

        assert!(scale.to_graph(&batch("x"), &batch("x")).is_err());
    }
}
