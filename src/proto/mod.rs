//! ONNX protobuf codec.
//!
//! A hand-written reader/writer for the subset of `onnx.proto` that this crate
//! produces and executes. Decoding skips fields it does not model, so files
//! written by other exporters load as long as the graph itself is supported.

mod onnx;
mod wire;

pub use onnx::{
    AttributeProto, AttributeType, Dimension, GraphProto, ModelProto, NodeProto,
    OperatorSetIdProto, StringStringEntryProto, TensorProto, TensorShapeProto, TensorTypeProto,
    TypeProto, ValueInfoProto, DATA_LOCATION_EXTERNAL, data_type,
};
pub(crate) use onnx::normalize_domain;
pub use wire::{Reader, WireType, Writer};

use crate::error::Result;

/// A protobuf message that knows its own field layout.
pub trait Message: Default {
    fn encode_fields(&self, w: &mut Writer);

    fn merge_field(&mut self, field: u32, wire: WireType, r: &mut Reader<'_>) -> Result<()>;

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode_fields(&mut w);
        w.into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_from(&mut Reader::new(bytes))
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        let mut message = Self::default();
        while !r.is_empty() {
            let (field, wire) = r.read_key()?;
            message.merge_field(field, wire, r)?;
        }
        Ok(message)
    }
}
