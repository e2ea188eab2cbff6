//! Incremental construction of ONNX graphs.
//!
//! Node and value names follow the scoped scheme PyTorch's exporter uses
//! (`/Mul`, `/Constant_output_0`, ...), so exported files read the same in
//! model viewers.

use std::collections::HashMap;

use crate::proto::{AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto};
use crate::signature::ValueSignature;
use crate::tensor::Tensor;

/// IR version written into exported models (ONNX 1.13+ readers).
pub const IR_VERSION: i64 = 8;

/// Default-domain opset the exporter targets.
pub const DEFAULT_OPSET_VERSION: i64 = 17;

pub struct GraphBuilder {
    graph: GraphProto,
    op_counts: HashMap<String, usize>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: GraphProto {
                name: name.into(),
                ..Default::default()
            },
            op_counts: HashMap::new(),
        }
    }

    pub fn add_input(&mut self, sig: &ValueSignature) {
        self.graph.input.push(sig.to_value_info());
    }

    pub fn add_output(&mut self, sig: &ValueSignature) {
        self.graph.output.push(sig.to_value_info());
    }

    pub fn add_initializer(&mut self, name: &str, value: &Tensor) {
        self.graph.initializer.push(value.to_proto(name));
    }

    /// Emits a `Constant` node holding `value` and returns its output name.
    pub fn add_constant(&mut self, value: &Tensor) -> String {
        let name = self.node_name("Constant");
        let output = format!("{name}_output_0");
        self.graph.node.push(NodeProto {
            output: vec![output.clone()],
            name,
            op_type: "Constant".to_string(),
            attribute: vec![AttributeProto::tensor("value", value.to_proto(""))],
            ..Default::default()
        });
        output
    }

    /// Emits a default-domain node. When `output` is `None` a scoped name is
    /// generated. Returns the output name.
    pub fn add_node(&mut self, op_type: &str, inputs: &[&str], output: Option<&str>) -> String {
        let name = self.node_name(op_type);
        let output = output
            .map(str::to_string)
            .unwrap_or_else(|| format!("{name}_output_0"));
        self.graph.node.push(NodeProto {
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: vec![output.clone()],
            name,
            op_type: op_type.to_string(),
            ..Default::default()
        });
        output
    }

    fn node_name(&mut self, op_type: &str) -> String {
        let count = self.op_counts.entry(op_type.to_string()).or_insert(0);
        let name = if *count == 0 {
            format!("/{op_type}")
        } else {
            format!("/{op_type}_{count}")
        };
        *count += 1;
        name
    }

    pub fn finish(self) -> GraphProto {
        self.graph
    }
}

/// Wraps `graph` in a model importing the default domain at `opset_version`.
pub fn model_from_graph(graph: GraphProto, opset_version: i64) -> ModelProto {
    ModelProto {
        ir_version: IR_VERSION,
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: opset_version,
        }],
        producer_name: env!("CARGO_PKG_NAME").to_string(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        graph: Some(graph),
        ..Default::default()
    }
}
