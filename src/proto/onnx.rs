//! ONNX message types and their field numbers.

use crate::error::Result;
use crate::proto::{Message, Reader, WireType, Writer};

/// `TensorProto.DataType` codes.
pub mod data_type {
    pub const UNDEFINED: i32 = 0;
    pub const FLOAT: i32 = 1;
    pub const UINT8: i32 = 2;
    pub const INT8: i32 = 3;
    pub const INT32: i32 = 6;
    pub const INT64: i32 = 7;
    pub const STRING: i32 = 8;
    pub const BOOL: i32 = 9;
    pub const FLOAT16: i32 = 10;
    pub const DOUBLE: i32 = 11;
    pub const BFLOAT16: i32 = 16;
}

/// `TensorProto.DataLocation::EXTERNAL`.
pub const DATA_LOCATION_EXTERNAL: i32 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelProto {
    pub ir_version: i64,
    pub opset_import: Vec<OperatorSetIdProto>,
    pub producer_name: String,
    pub producer_version: String,
    pub domain: String,
    pub model_version: i64,
    pub doc_string: String,
    pub graph: Option<GraphProto>,
    pub metadata_props: Vec<StringStringEntryProto>,
}

impl Message for ModelProto {
    fn encode_fields(&self, w: &mut Writer) {
        w.int64(1, self.ir_version);
        if !self.producer_name.is_empty() {
            w.string(2, &self.producer_name);
        }
        if !self.producer_version.is_empty() {
            w.string(3, &self.producer_version);
        }
        if !self.domain.is_empty() {
            w.string(4, &self.domain);
        }
        if self.model_version != 0 {
            w.int64(5, self.model_version);
        }
        if !self.doc_string.is_empty() {
            w.string(6, &self.doc_string);
        }
        if let Some(graph) = &self.graph {
            w.message(7, graph);
        }
        // Opsets follow the graph, so a file cut short after the graph still
        // fails validation instead of loading with an empty import list.
        for opset in &self.opset_import {
            w.message(8, opset);
        }
        for prop in &self.metadata_props {
            w.message(14, prop);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.ir_version = r.read_int64(wire)?,
            2 => self.producer_name = r.read_string(wire)?,
            3 => self.producer_version = r.read_string(wire)?,
            4 => self.domain = r.read_string(wire)?,
            5 => self.model_version = r.read_int64(wire)?,
            6 => self.doc_string = r.read_string(wire)?,
            7 => self.graph = Some(r.read_message(wire)?),
            8 => self.opset_import.push(r.read_message(wire)?),
            14 => self.metadata_props.push(r.read_message(wire)?),
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

impl ModelProto {
    /// Opset version imported for `domain`, treating `ai.onnx` as the default
    /// domain.
    pub fn opset_version(&self, domain: &str) -> Option<i64> {
        let domain = normalize_domain(domain);
        self.opset_import
            .iter()
            .find(|o| normalize_domain(&o.domain) == domain)
            .map(|o| o.version)
    }
}

pub(crate) fn normalize_domain(domain: &str) -> &str {
    if domain == "ai.onnx" { "" } else { domain }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorSetIdProto {
    pub domain: String,
    pub version: i64,
}

impl Message for OperatorSetIdProto {
    fn encode_fields(&self, w: &mut Writer) {
        // The default domain is written explicitly, as protoc-based exporters do.
        w.string(1, &self.domain);
        w.int64(2, self.version);
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.domain = r.read_string(wire)?,
            2 => self.version = r.read_int64(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringStringEntryProto {
    pub key: String,
    pub value: String,
}

impl Message for StringStringEntryProto {
    fn encode_fields(&self, w: &mut Writer) {
        w.string(1, &self.key);
        w.string(2, &self.value);
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.key = r.read_string(wire)?,
            2 => self.value = r.read_string(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphProto {
    pub node: Vec<NodeProto>,
    pub name: String,
    pub initializer: Vec<TensorProto>,
    pub doc_string: String,
    pub input: Vec<ValueInfoProto>,
    pub output: Vec<ValueInfoProto>,
    pub value_info: Vec<ValueInfoProto>,
}

impl Message for GraphProto {
    fn encode_fields(&self, w: &mut Writer) {
        for node in &self.node {
            w.message(1, node);
        }
        w.string(2, &self.name);
        for tensor in &self.initializer {
            w.message(5, tensor);
        }
        if !self.doc_string.is_empty() {
            w.string(10, &self.doc_string);
        }
        for info in &self.input {
            w.message(11, info);
        }
        for info in &self.output {
            w.message(12, info);
        }
        for info in &self.value_info {
            w.message(13, info);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.node.push(r.read_message(wire)?),
            2 => self.name = r.read_string(wire)?,
            5 => self.initializer.push(r.read_message(wire)?),
            10 => self.doc_string = r.read_string(wire)?,
            11 => self.input.push(r.read_message(wire)?),
            12 => self.output.push(r.read_message(wire)?),
            13 => self.value_info.push(r.read_message(wire)?),
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeProto {
    pub input: Vec<String>,
    pub output: Vec<String>,
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub attribute: Vec<AttributeProto>,
    pub doc_string: String,
}

impl Message for NodeProto {
    fn encode_fields(&self, w: &mut Writer) {
        for input in &self.input {
            w.string(1, input);
        }
        for output in &self.output {
            w.string(2, output);
        }
        if !self.name.is_empty() {
            w.string(3, &self.name);
        }
        w.string(4, &self.op_type);
        for attr in &self.attribute {
            w.message(5, attr);
        }
        if !self.doc_string.is_empty() {
            w.string(6, &self.doc_string);
        }
        if !self.domain.is_empty() {
            w.string(7, &self.domain);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.input.push(r.read_string(wire)?),
            2 => self.output.push(r.read_string(wire)?),
            3 => self.name = r.read_string(wire)?,
            4 => self.op_type = r.read_string(wire)?,
            5 => self.attribute.push(r.read_message(wire)?),
            6 => self.doc_string = r.read_string(wire)?,
            7 => self.domain = r.read_string(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

impl NodeProto {
    pub fn attribute(&self, name: &str) -> Option<&AttributeProto> {
        self.attribute.iter().find(|a| a.name == name)
    }
}

/// `AttributeProto.AttributeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Float,
    Int,
    String,
    Tensor,
    Graph,
    Floats,
    Ints,
    Strings,
    Tensors,
    Graphs,
}

impl AttributeType {
    pub fn from_i32(code: i32) -> Option<Self> {
        Some(match code {
            1 => AttributeType::Float,
            2 => AttributeType::Int,
            3 => AttributeType::String,
            4 => AttributeType::Tensor,
            5 => AttributeType::Graph,
            6 => AttributeType::Floats,
            7 => AttributeType::Ints,
            8 => AttributeType::Strings,
            9 => AttributeType::Tensors,
            10 => AttributeType::Graphs,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            AttributeType::Float => 1,
            AttributeType::Int => 2,
            AttributeType::String => 3,
            AttributeType::Tensor => 4,
            AttributeType::Graph => 5,
            AttributeType::Floats => 6,
            AttributeType::Ints => 7,
            AttributeType::Strings => 8,
            AttributeType::Tensors => 9,
            AttributeType::Graphs => 10,
        }
    }
}

/// Graph-valued attributes are not modelled and are skipped on decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeProto {
    pub name: String,
    pub r#type: i32,
    pub f: f32,
    pub i: i64,
    pub s: Vec<u8>,
    pub t: Option<TensorProto>,
    pub floats: Vec<f32>,
    pub ints: Vec<i64>,
    pub strings: Vec<Vec<u8>>,
    pub doc_string: String,
}

impl AttributeProto {
    pub fn tensor(name: impl Into<String>, value: TensorProto) -> Self {
        Self {
            name: name.into(),
            r#type: AttributeType::Tensor.code(),
            t: Some(value),
            ..Default::default()
        }
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            r#type: AttributeType::Float.code(),
            f: value,
            ..Default::default()
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            r#type: AttributeType::Int.code(),
            i: value,
            ..Default::default()
        }
    }

    pub fn attr_type(&self) -> Option<AttributeType> {
        AttributeType::from_i32(self.r#type)
    }
}

impl Message for AttributeProto {
    fn encode_fields(&self, w: &mut Writer) {
        w.string(1, &self.name);
        // Scalars have no presence bit of their own; the type decides which
        // value field is meaningful.
        match self.attr_type() {
            Some(AttributeType::Float) => w.float(2, self.f),
            Some(AttributeType::Int) => w.int64(3, self.i),
            Some(AttributeType::String) => w.bytes(4, &self.s),
            _ => {}
        }
        if let Some(t) = &self.t {
            w.message(5, t);
        }
        w.floats(7, &self.floats);
        w.int64s(8, &self.ints);
        for s in &self.strings {
            w.bytes(9, s);
        }
        if !self.doc_string.is_empty() {
            w.string(13, &self.doc_string);
        }
        w.int32(20, self.r#type);
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.name = r.read_string(wire)?,
            2 => self.f = r.read_float(wire)?,
            3 => self.i = r.read_int64(wire)?,
            4 => self.s = r.read_bytes(wire)?.to_vec(),
            5 => self.t = Some(r.read_message(wire)?),
            7 => r.read_repeated_float(wire, &mut self.floats)?,
            8 => r.read_repeated_int64(wire, &mut self.ints)?,
            9 => self.strings.push(r.read_bytes(wire)?.to_vec()),
            13 => self.doc_string = r.read_string(wire)?,
            20 => self.r#type = r.read_int32(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorProto {
    pub dims: Vec<i64>,
    pub data_type: i32,
    pub float_data: Vec<f32>,
    pub int32_data: Vec<i32>,
    pub int64_data: Vec<i64>,
    pub name: String,
    pub raw_data: Vec<u8>,
    pub double_data: Vec<f64>,
    pub doc_string: String,
    pub data_location: i32,
}

impl Message for TensorProto {
    fn encode_fields(&self, w: &mut Writer) {
        w.int64s(1, &self.dims);
        w.int32(2, self.data_type);
        w.packed_float(4, &self.float_data);
        w.packed_int32(5, &self.int32_data);
        w.packed_int64(7, &self.int64_data);
        if !self.name.is_empty() {
            w.string(8, &self.name);
        }
        if !self.raw_data.is_empty() {
            w.bytes(9, &self.raw_data);
        }
        w.packed_double(10, &self.double_data);
        if !self.doc_string.is_empty() {
            w.string(12, &self.doc_string);
        }
        if self.data_location != 0 {
            w.int32(14, self.data_location);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => r.read_repeated_int64(wire, &mut self.dims)?,
            2 => self.data_type = r.read_int32(wire)?,
            4 => r.read_repeated_float(wire, &mut self.float_data)?,
            5 => r.read_repeated_int32(wire, &mut self.int32_data)?,
            7 => r.read_repeated_int64(wire, &mut self.int64_data)?,
            8 => self.name = r.read_string(wire)?,
            9 => self.raw_data = r.read_bytes(wire)?.to_vec(),
            10 => r.read_repeated_double(wire, &mut self.double_data)?,
            12 => self.doc_string = r.read_string(wire)?,
            14 => self.data_location = r.read_int32(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueInfoProto {
    pub name: String,
    pub r#type: Option<TypeProto>,
    pub doc_string: String,
}

impl Message for ValueInfoProto {
    fn encode_fields(&self, w: &mut Writer) {
        w.string(1, &self.name);
        if let Some(ty) = &self.r#type {
            w.message(2, ty);
        }
        if !self.doc_string.is_empty() {
            w.string(3, &self.doc_string);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.name = r.read_string(wire)?,
            2 => self.r#type = Some(r.read_message(wire)?),
            3 => self.doc_string = r.read_string(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

impl ValueInfoProto {
    pub fn tensor_type(&self) -> Option<&TensorTypeProto> {
        self.r#type.as_ref()?.tensor_type.as_ref()
    }
}

/// Only the tensor arm of the `value` oneof is modelled; sequence, map and
/// optional types decode with `tensor_type == None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeProto {
    pub tensor_type: Option<TensorTypeProto>,
    pub denotation: String,
}

impl Message for TypeProto {
    fn encode_fields(&self, w: &mut Writer) {
        if let Some(tensor) = &self.tensor_type {
            w.message(1, tensor);
        }
        if !self.denotation.is_empty() {
            w.string(6, &self.denotation);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.tensor_type = Some(r.read_message(wire)?),
            6 => self.denotation = r.read_string(wire)?,
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorTypeProto {
    pub elem_type: i32,
    pub shape: Option<TensorShapeProto>,
}

impl Message for TensorTypeProto {
    fn encode_fields(&self, w: &mut Writer) {
        w.int32(1, self.elem_type);
        if let Some(shape) = &self.shape {
            w.message(2, shape);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.elem_type = r.read_int32(wire)?,
            2 => self.shape = Some(r.read_message(wire)?),
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorShapeProto {
    pub dim: Vec<Dimension>,
}

impl Message for TensorShapeProto {
    fn encode_fields(&self, w: &mut Writer) {
        for dim in &self.dim {
            w.message(1, dim);
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => self.dim.push(r.read_message(wire)?),
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

/// `TensorShapeProto.Dimension`: a fixed size, a named symbolic size, or
/// neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dimension {
    #[default]
    Unknown,
    Value(i64),
    Param(String),
}

impl Message for Dimension {
    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Dimension::Unknown => {}
            Dimension::Value(v) => w.int64(1, *v),
            Dimension::Param(p) => w.string(2, p),
        }
    }

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()> {
        match field {
            1 => *self = Dimension::Value(r.read_int64(wire)?),
            2 => *self = Dimension::Param(r.read_string(wire)?),
            _ => r.skip(wire)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_oneof() {
        let fixed = Dimension::Value(4).encode_to_vec();
        assert_eq!(fixed, vec![0x08, 0x04]);
        assert_eq!(Dimension::decode(&fixed).unwrap(), Dimension::Value(4));

        let symbolic = Dimension::Param("batch_size".into()).encode_to_vec();
        assert_eq!(symbolic[0], 0x12);
        assert_eq!(
            Dimension::decode(&symbolic).unwrap(),
            Dimension::Param("batch_size".into())
        );

        assert_eq!(Dimension::decode(&[]).unwrap(), Dimension::Unknown);
    }

    #[test]
    fn test_tensor_dims_are_written_unpacked() {
        let tensor = TensorProto {
            dims: vec![2, 3],
            data_type: data_type::FLOAT,
            ..Default::default()
        };
        let bytes = tensor.encode_to_vec();
        // dims: key 0x08 per element, then data_type key 0x10
        assert_eq!(&bytes[..6], &[0x08, 0x02, 0x08, 0x03, 0x10, 0x01]);
    }

    #[test]
    fn test_tensor_accepts_packed_dims_and_unpacked_floats() {
        // dims packed: field 1, wire 2, len 2, [2, 1]
        // data_type: field 2 = FLOAT
        // float_data unpacked: field 4, wire 5, twice
        let mut bytes = vec![0x0a, 0x02, 0x02, 0x01, 0x10, 0x01];
        bytes.push(0x25);
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.push(0x25);
        bytes.extend_from_slice(&(-2.0f32).to_le_bytes());

        let tensor = TensorProto::decode(&bytes).unwrap();
        assert_eq!(tensor.dims, vec![2, 1]);
        assert_eq!(tensor.data_type, data_type::FLOAT);
        assert_eq!(tensor.float_data, vec![1.5, -2.0]);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut w = Writer::new();
        w.string(2, "main_graph");
        // sparse_initializer (15) is not modelled
        w.bytes(15, &[0x01, 0x02, 0x03]);
        w.int64(99, 7);
        let graph = GraphProto::decode(&w.into_bytes()).unwrap();
        assert_eq!(graph.name, "main_graph");
        assert!(graph.node.is_empty());
    }

    #[test]
    fn test_attribute_value_follows_type() {
        let attr = AttributeProto::float("alpha", 0.0);
        let decoded = AttributeProto::decode(&attr.encode_to_vec()).unwrap();
        assert_eq!(decoded.attr_type(), Some(AttributeType::Float));
        assert_eq!(decoded.f, 0.0);

        let attr = AttributeProto::tensor(
            "value",
            TensorProto {
                data_type: data_type::FLOAT,
                raw_data: 2.0f32.to_le_bytes().to_vec(),
                ..Default::default()
            },
        );
        let decoded = AttributeProto::decode(&attr.encode_to_vec()).unwrap();
        assert_eq!(decoded, attr);
    }

    #[test]
    fn test_model_roundtrip_keeps_opsets_and_metadata() {
        let model = ModelProto {
            ir_version: 8,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 17,
            }],
            producer_name: "test".into(),
            graph: Some(GraphProto {
                name: "g".into(),
                ..Default::default()
            }),
            metadata_props: vec![StringStringEntryProto {
                key: "k".into(),
                value: "v".into(),
            }],
            ..Default::default()
        };
        let decoded = ModelProto::decode(&model.encode_to_vec()).unwrap();
        assert_eq!(decoded, model);
        assert_eq!(decoded.opset_version("ai.onnx"), Some(17));
        assert_eq!(decoded.opset_version("com.microsoft"), None);
    }

    #[test]
    fn test_truncated_model_fails_to_decode() {
        let model = ModelProto {
            ir_version: 8,
            graph: Some(GraphProto {
                name: "a graph with a long enough name".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let bytes = model.encode_to_vec();
        assert!(ModelProto::decode(&bytes[..bytes.len() - 3]).is_err());
    }
}
