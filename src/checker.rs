//! Structural validation of ONNX models.
//!
//! Mirrors the checks `onnx.checker.check_model` performs that matter for a
//! graph of elementwise ops: well-formed metadata, typed I/O, consistent
//! initializers, and a topologically sorted node list in SSA form.
//! Element types are propagated through the graph so operand mismatches and
//! integer division by zero are caught before a runtime sees the model.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::proto::{AttributeType, GraphProto, ModelProto, NodeProto, ValueInfoProto, normalize_domain};
use crate::signature::ValueSignature;
use crate::tensor::{ElemType, Tensor, TensorData};

/// Default-domain operators a checked model may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Constant,
    Identity,
    Add,
    Sub,
    Mul,
    Div,
}

impl OpKind {
    pub fn lookup(domain: &str, op_type: &str) -> Option<Self> {
        if !normalize_domain(domain).is_empty() {
            return None;
        }
        Some(match op_type {
            "Constant" => OpKind::Constant,
            "Identity" => OpKind::Identity,
            "Add" => OpKind::Add,
            "Sub" => OpKind::Sub,
            "Mul" => OpKind::Mul,
            "Div" => OpKind::Div,
            _ => return None,
        })
    }

    pub fn resolve(node: &NodeProto) -> Result<Self> {
        Self::lookup(&node.domain, &node.op_type).ok_or_else(|| Error::UnsupportedOp {
            domain: normalize_domain(&node.domain).to_string(),
            op_type: node.op_type.clone(),
        })
    }

    /// Number of (inputs, outputs) the node must declare.
    pub fn arity(self) -> (usize, usize) {
        match self {
            OpKind::Constant => (0, 1),
            OpKind::Identity => (1, 1),
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => (2, 1),
        }
    }
}

/// Value of a `Constant` node, from whichever `value*` attribute it carries.
pub fn constant_value(node: &NodeProto) -> Result<Tensor> {
    let invalid = |reason: &str| Error::validation(format!("Constant node '{}': {reason}", node.name));
    let [attr] = node.attribute.as_slice() else {
        return Err(invalid("expected exactly one value attribute"));
    };
    match (attr.name.as_str(), attr.attr_type()) {
        ("value", Some(AttributeType::Tensor)) => {
            let proto = attr.t.as_ref().ok_or_else(|| invalid("tensor attribute is empty"))?;
            Tensor::from_proto(proto)
        }
        ("value_float", Some(AttributeType::Float)) => {
            Ok(Tensor::scalar(f64::from(attr.f), ElemType::F32))
        }
        ("value_int", Some(AttributeType::Int)) => Tensor::new(TensorData::I64(vec![attr.i]), ()),
        ("value_floats", Some(AttributeType::Floats)) => Ok(Tensor::vector(attr.floats.clone())),
        ("value_ints", Some(AttributeType::Ints)) => {
            Tensor::new(TensorData::I64(attr.ints.clone()), attr.ints.len())
        }
        (name, _) => Err(invalid(&format!("unsupported attribute '{name}'"))),
    }
}

pub const MIN_IR_VERSION: i64 = 3;
pub const MAX_IR_VERSION: i64 = 10;

pub fn check_model(model: &ModelProto) -> Result<()> {
    if !(MIN_IR_VERSION..=MAX_IR_VERSION).contains(&model.ir_version) {
        return Err(Error::validation(format!(
            "IR version {} is outside the supported range {MIN_IR_VERSION}..={MAX_IR_VERSION}",
            model.ir_version
        )));
    }
    check_opsets(model)?;
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| Error::validation("model has no graph"))?;
    check_graph(graph, model)
}

fn check_opsets(model: &ModelProto) -> Result<()> {
    if model.opset_import.is_empty() {
        return Err(Error::validation("model imports no opsets"));
    }
    let mut seen = HashSet::new();
    for opset in &model.opset_import {
        let domain = normalize_domain(&opset.domain);
        if !seen.insert(domain) {
            return Err(Error::validation(format!(
                "opset for domain '{domain}' is imported more than once"
            )));
        }
        if opset.version < 1 {
            return Err(Error::validation(format!(
                "opset for domain '{domain}' has invalid version {}",
                opset.version
            )));
        }
    }
    if !seen.contains("") {
        return Err(Error::validation("model does not import the default ONNX domain"));
    }
    Ok(())
}

fn check_graph(graph: &GraphProto, model: &ModelProto) -> Result<()> {
    if graph.name.is_empty() {
        return Err(Error::validation("graph has no name"));
    }

    // Element type of every name that currently holds a value.
    let mut types: HashMap<&str, ElemType> = HashMap::new();
    // Values fixed at load time and not overridable by a feed.
    let mut constants: HashMap<&str, Tensor> = HashMap::new();

    for tensor in &graph.initializer {
        if tensor.name.is_empty() {
            return Err(Error::validation("initializer has no name"));
        }
        let value = Tensor::from_proto(tensor).map_err(|e| {
            Error::validation(format!("initializer '{}' is malformed: {e}", tensor.name))
        })?;
        if types.insert(&tensor.name, value.elem_type()).is_some() {
            return Err(Error::validation(format!(
                "initializer '{}' is defined more than once",
                tensor.name
            )));
        }
        constants.insert(&tensor.name, value);
    }

    let mut declared = HashSet::new();
    for input in &graph.input {
        let sig = check_value_info(input, "input")?;
        if !declared.insert(input.name.as_str()) {
            return Err(Error::validation(format!(
                "graph input '{}' is declared more than once",
                input.name
            )));
        }
        // IR >= 4 lets initializers double as optional inputs; a feed may
        // replace them.
        if let Some(init) = types.get(input.name.as_str()) {
            if *init != sig.elem_type {
                return Err(Error::validation(format!(
                    "graph input '{}' is {} but its initializer is {init}",
                    input.name, sig.elem_type
                )));
            }
        }
        constants.remove(input.name.as_str());
        types.insert(&input.name, sig.elem_type);
    }

    for (index, node) in graph.node.iter().enumerate() {
        let label = node_label(node, index);
        let kind = check_node(node, &label, model)?;
        let mut operand_types = Vec::with_capacity(node.input.len());
        for input in &node.input {
            match types.get(input.as_str()) {
                Some(ty) => operand_types.push(*ty),
                None => {
                    return Err(Error::validation(format!(
                        "node '{label}' uses '{input}' before it is defined"
                    )));
                }
            }
        }

        let output_type = match kind {
            OpKind::Constant => {
                let value = constant_value(node)?;
                let ty = value.elem_type();
                constants.insert(&node.output[0], value);
                ty
            }
            _ => {
                let first = operand_types[0];
                if let Some(other) = operand_types.iter().find(|ty| **ty != first) {
                    return Err(Error::validation(format!(
                        "node '{label}' ({}) mixes {first} and {other} operands",
                        node.op_type
                    )));
                }
                if kind == OpKind::Div && first == ElemType::I64 {
                    check_integer_divisor(node, &label, &constants)?;
                }
                first
            }
        };

        let output = &node.output[0];
        if output.is_empty() {
            return Err(Error::validation(format!("node '{label}' has an unnamed output")));
        }
        if types.insert(output, output_type).is_some() {
            return Err(Error::validation(format!(
                "'{output}' is assigned more than once (node '{label}')"
            )));
        }
    }

    for info in &graph.value_info {
        check_value_info(info, "value_info")?;
    }

    if graph.output.is_empty() {
        return Err(Error::validation("graph declares no outputs"));
    }
    for output in &graph.output {
        let sig = check_value_info(output, "output")?;
        match types.get(output.name.as_str()) {
            None => {
                return Err(Error::validation(format!(
                    "graph output '{}' is never produced",
                    output.name
                )));
            }
            Some(ty) if *ty != sig.elem_type => {
                return Err(Error::validation(format!(
                    "graph output '{}' is declared {} but produced as {ty}",
                    output.name, sig.elem_type
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Integer `Div` must divide by a known non-zero constant.
fn check_integer_divisor(
    node: &NodeProto,
    label: &str,
    constants: &HashMap<&str, Tensor>,
) -> Result<()> {
    let divisor = &node.input[1];
    let Some(value) = constants.get(divisor.as_str()) else {
        return Err(Error::validation(format!(
            "integer Div in node '{label}' needs a constant divisor, '{divisor}' is computed at run time"
        )));
    };
    if let TensorData::I64(values) = value.data() {
        if values.contains(&0) {
            return Err(Error::validation(format!(
                "integer Div in node '{label}' divides by zero"
            )));
        }
    }
    Ok(())
}

fn check_value_info(info: &ValueInfoProto, role: &str) -> Result<ValueSignature> {
    if info.name.is_empty() {
        return Err(Error::validation(format!("graph {role} has no name")));
    }
    if info.r#type.is_none() {
        return Err(Error::validation(format!("{role} '{}' has no type", info.name)));
    }
    ValueSignature::from_value_info(info)
        .map_err(|e| Error::validation(format!("{role} '{}': {e}", info.name)))
}

fn check_node(node: &NodeProto, label: &str, model: &ModelProto) -> Result<OpKind> {
    if node.op_type.is_empty() {
        return Err(Error::validation(format!("node '{label}' has no op_type")));
    }
    if model.opset_version(&node.domain).is_none() {
        return Err(Error::validation(format!(
            "node '{label}' uses domain '{}' which is not imported",
            node.domain
        )));
    }
    let kind = OpKind::resolve(node)?;

    let (inputs, outputs) = kind.arity();
    if node.input.len() != inputs || node.output.len() != outputs {
        return Err(Error::validation(format!(
            "node '{label}' ({}) expects {inputs} inputs and {outputs} outputs, found {} and {}",
            node.op_type,
            node.input.len(),
            node.output.len()
        )));
    }

    let mut names = HashSet::new();
    for attr in &node.attribute {
        if attr.name.is_empty() {
            return Err(Error::validation(format!("node '{label}' has an unnamed attribute")));
        }
        if !names.insert(attr.name.as_str()) {
            return Err(Error::validation(format!(
                "node '{label}' repeats attribute '{}'",
                attr.name
            )));
        }
        match attr.attr_type() {
            None => {
                return Err(Error::validation(format!(
                    "attribute '{}' of node '{label}' has unknown type {}",
                    attr.name, attr.r#type
                )));
            }
            Some(AttributeType::Tensor) if attr.t.is_none() => {
                return Err(Error::validation(format!(
                    "tensor attribute '{}' of node '{label}' has no value",
                    attr.name
                )));
            }
            _ => {}
        }
    }

    if kind != OpKind::Constant && !node.attribute.is_empty() {
        return Err(Error::validation(format!(
            "node '{label}' ({}) takes no attributes",
            node.op_type
        )));
    }
    Ok(kind)
}

fn node_label(node: &NodeProto, index: usize) -> String {
    if node.name.is_empty() {
        format!("#{index}")
    } else {
        node.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DEFAULT_OPSET_VERSION, GraphBuilder, model_from_graph};
    use crate::proto::{AttributeProto, OperatorSetIdProto, TensorProto, data_type};
    use crate::signature::Dim;

    fn sig(name: &str) -> ValueSignature {
        ValueSignature::new(name, ElemType::F32, vec![Dim::symbolic("batch_size")])
    }

    fn doubling_model() -> ModelProto {
        let mut b = GraphBuilder::new("main_graph");
        b.add_input(&sig("input"));
        let two = b.add_constant(&Tensor::scalar(2.0, ElemType::F32));
        b.add_node("Mul", &["input", two.as_str()], Some("output"));
        b.add_output(&sig("output"));
        model_from_graph(b.finish(), DEFAULT_OPSET_VERSION)
    }

    fn graph_mut(model: &mut ModelProto) -> &mut GraphProto {
        model.graph.as_mut().unwrap()
    }

    fn assert_invalid(model: &ModelProto, needle: &str) {
        match check_model(model) {
            Err(Error::Validation(msg)) => {
                assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_model_passes() {
        check_model(&doubling_model()).unwrap();
    }

    #[test]
    fn test_initializer_model_passes() {
        let mut b = GraphBuilder::new("main_graph");
        b.add_input(&sig("input"));
        b.add_initializer("scale", &Tensor::scalar(2.0, ElemType::F32));
        b.add_node("Mul", &["input", "scale"], Some("output"));
        b.add_output(&sig("output"));
        check_model(&model_from_graph(b.finish(), DEFAULT_OPSET_VERSION)).unwrap();
    }

    #[test]
    fn test_ir_version_and_opsets() {
        let mut model = doubling_model();
        model.ir_version = 0;
        assert_invalid(&model, "IR version");

        let mut model = doubling_model();
        model.opset_import.clear();
        assert_invalid(&model, "no opsets");

        let mut model = doubling_model();
        model.opset_import.push(OperatorSetIdProto {
            domain: "ai.onnx".into(),
            version: 17,
        });
        assert_invalid(&model, "more than once");

        let mut model = doubling_model();
        model.opset_import[0].domain = "com.example".into();
        assert_invalid(&model, "default ONNX domain");
    }

    #[test]
    fn test_missing_graph() {
        let mut model = doubling_model();
        model.graph = None;
        assert_invalid(&model, "no graph");
    }

    #[test]
    fn test_use_before_definition() {
        let mut model = doubling_model();
        graph_mut(&mut model).node.reverse();
        assert_invalid(&model, "before it is defined");
    }

    #[test]
    fn test_output_never_produced() {
        let mut model = doubling_model();
        graph_mut(&mut model).node[1].output = vec!["other".into()];
        assert_invalid(&model, "never produced");
    }

    #[test]
    fn test_double_assignment() {
        let mut model = doubling_model();
        graph_mut(&mut model).node[0].output = vec!["input".into()];
        assert_invalid(&model, "assigned more than once");
    }

    #[test]
    fn test_unknown_op_and_arity() {
        let mut model = doubling_model();
        graph_mut(&mut model).node[1].op_type = "Gemm".into();
        assert!(matches!(
            check_model(&model),
            Err(Error::UnsupportedOp { op_type, .. }) if op_type == "Gemm"
        ));

        let mut model = doubling_model();
        graph_mut(&mut model).node[1].input.push("input".into());
        assert_invalid(&model, "expects 2 inputs");
    }

    #[test]
    fn test_untyped_io() {
        let mut model = doubling_model();
        graph_mut(&mut model).input[0].r#type = None;
        assert_invalid(&model, "has no type");

        let mut model = doubling_model();
        graph_mut(&mut model).output[0]
            .r#type
            .as_mut()
            .unwrap()
            .tensor_type
            .as_mut()
            .unwrap()
            .elem_type = 0;
        assert_invalid(&model, "undefined");
    }

    #[test]
    fn test_bad_attributes() {
        let mut model = doubling_model();
        graph_mut(&mut model).node[1]
            .attribute
            .push(AttributeProto::int("broadcast", 1));
        assert_invalid(&model, "takes no attributes");

        let mut model = doubling_model();
        graph_mut(&mut model).node[0].attribute[0].t = None;
        assert_invalid(&model, "has no value");
    }

    fn int_division(divisor: Option<i64>) -> ModelProto {
        let mut b = GraphBuilder::new("ints");
        let x = ValueSignature::new("x", ElemType::I64, vec![Dim::Any]);
        b.add_input(&x);
        let d = match divisor {
            Some(v) => b.add_constant(&Tensor::scalar(v as f64, ElemType::I64)),
            None => {
                b.add_input(&ValueSignature::new("d", ElemType::I64, vec![]));
                "d".to_string()
            }
        };
        b.add_node("Div", &["x", d.as_str()], Some("y"));
        b.add_output(&ValueSignature::new("y", ElemType::I64, vec![Dim::Any]));
        model_from_graph(b.finish(), DEFAULT_OPSET_VERSION)
    }

    #[test]
    fn test_integer_division() {
        check_model(&int_division(Some(2))).unwrap();
        assert_invalid(&int_division(Some(0)), "divides by zero");
        assert_invalid(&int_division(None), "needs a constant divisor");
    }

    #[test]
    fn test_float_division_by_input_passes() {
        let mut b = GraphBuilder::new("floats");
        b.add_input(&sig("a"));
        b.add_input(&sig("b"));
        b.add_node("Div", &["a", "b"], Some("output"));
        b.add_output(&sig("output"));
        check_model(&model_from_graph(b.finish(), DEFAULT_OPSET_VERSION)).unwrap();
    }

    #[test]
    fn test_operand_and_output_types() {
        let mut b = GraphBuilder::new("mixed");
        b.add_input(&sig("input"));
        let two = b.add_constant(&Tensor::scalar(2.0, ElemType::F64));
        b.add_node("Mul", &["input", two.as_str()], Some("output"));
        b.add_output(&sig("output"));
        assert_invalid(&model_from_graph(b.finish(), DEFAULT_OPSET_VERSION), "mixes float32 and float64");

        let mut b = GraphBuilder::new("retyped");
        b.add_input(&sig("input"));
        b.add_node("Identity", &["input"], Some("output"));
        b.add_output(&ValueSignature::new("output", ElemType::F64, vec![Dim::Any]));
        assert_invalid(&model_from_graph(b.finish(), DEFAULT_OPSET_VERSION), "produced as float32");
    }

    #[test]
    fn test_huge_initializer_dims() {
        let mut model = doubling_model();
        graph_mut(&mut model).initializer.push(TensorProto {
            name: "huge".into(),
            dims: vec![1 << 40, 1 << 40],
            data_type: data_type::FLOAT,
            ..Default::default()
        });
        assert_invalid(&model, "overflow");
    }

    #[test]
    fn test_op_lookup() {
        assert_eq!(OpKind::lookup("", "Mul"), Some(OpKind::Mul));
        assert_eq!(OpKind::lookup("ai.onnx", "Mul"), Some(OpKind::Mul));
        assert_eq!(OpKind::lookup("com.microsoft", "Mul"), None);
        assert_eq!(OpKind::lookup("", "MatMul"), None);
        assert_eq!(OpKind::Mul.arity(), (2, 1));
        assert_eq!(OpKind::Constant.arity(), (0, 1));
    }

    fn constant_node(attribute: Vec<AttributeProto>) -> NodeProto {
        NodeProto {
            name: "/Constant".into(),
            op_type: "Constant".into(),
            output: vec!["c".into()],
            attribute,
            ..Default::default()
        }
    }

    #[test]
    fn test_constant_value_attributes() {
        let tensor = TensorProto {
            data_type: data_type::FLOAT,
            float_data: vec![2.0],
            ..Default::default()
        };
        let node = constant_node(vec![AttributeProto::tensor("value", tensor)]);
        assert_eq!(constant_value(&node).unwrap(), Tensor::scalar(2.0, ElemType::F32));

        let node = constant_node(vec![AttributeProto::float("value_float", 2.0)]);
        assert_eq!(constant_value(&node).unwrap(), Tensor::scalar(2.0, ElemType::F32));

        let node = constant_node(vec![AttributeProto::int("value_int", 3)]);
        assert_eq!(constant_value(&node).unwrap().data(), &TensorData::I64(vec![3]));

        assert!(constant_value(&constant_node(vec![])).is_err());
        let node = constant_node(vec![AttributeProto::int("sparse_value", 1)]);
        assert!(constant_value(&node).is_err());
    }

    #[test]
    fn test_malformed_initializer() {
        let mut model = doubling_model();
        let mut scale = Tensor::scalar(2.0, ElemType::F32).to_proto("scale");
        scale.dims = vec![3];
        graph_mut(&mut model).initializer.push(scale);
        assert_invalid(&model, "initializer 'scale' is malformed");
    }
}
