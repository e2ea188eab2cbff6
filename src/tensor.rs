use std::fmt;

use candle_core::{DType, Device, Shape};

use crate::error::{Error, Result};
use crate::proto::{DATA_LOCATION_EXTERNAL, TensorProto, data_type};

/// Element types a checked graph and a session can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    F32,
    F64,
    I64,
}

impl ElemType {
    pub fn from_onnx(code: i32) -> Result<Self> {
        match code {
            data_type::FLOAT => Ok(ElemType::F32),
            data_type::DOUBLE => Ok(ElemType::F64),
            data_type::INT64 => Ok(ElemType::I64),
            other => Err(Error::UnsupportedType(onnx_type_name(other).to_string())),
        }
    }

    pub fn onnx_code(self) -> i32 {
        match self {
            ElemType::F32 => data_type::FLOAT,
            ElemType::F64 => data_type::DOUBLE,
            ElemType::I64 => data_type::INT64,
        }
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            ElemType::F32 => 4,
            ElemType::F64 | ElemType::I64 => 8,
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(onnx_type_name(self.onnx_code()))
    }
}

/// Human-readable name for an ONNX `TensorProto.DataType` code.
pub fn onnx_type_name(code: i32) -> &'static str {
    match code {
        data_type::UNDEFINED => "undefined",
        data_type::FLOAT => "float32",
        data_type::UINT8 => "uint8",
        data_type::INT8 => "int8",
        data_type::INT32 => "int32",
        data_type::INT64 => "int64",
        data_type::STRING => "string",
        data_type::BOOL => "bool",
        data_type::FLOAT16 => "float16",
        data_type::DOUBLE => "float64",
        data_type::BFLOAT16 => "bfloat16",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I64(Vec<i64>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elem_type(&self) -> ElemType {
        match self {
            TensorData::F32(_) => ElemType::F32,
            TensorData::F64(_) => ElemType::F64,
            TensorData::I64(_) => ElemType::I64,
        }
    }
}

/// Host-side tensor fed to and returned from a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
    shape: Shape,
}

impl Tensor {
    pub fn new<S: Into<Shape>>(data: TensorData, shape: S) -> Result<Self> {
        let shape = shape.into();
        if shape.elem_count() != data.len() {
            return Err(Error::ElementCount {
                shape: shape.dims().to_vec(),
                len: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Rank-1 float32 tensor.
    pub fn vector(values: Vec<f32>) -> Self {
        let shape = Shape::from(values.len());
        Self {
            data: TensorData::F32(values),
            shape,
        }
    }

    /// Rank-0 tensor holding `value` converted to `elem_type`.
    pub fn scalar(value: f64, elem_type: ElemType) -> Self {
        let data = match elem_type {
            ElemType::F32 => TensorData::F32(vec![value as f32]),
            ElemType::F64 => TensorData::F64(vec![value]),
            ElemType::I64 => TensorData::I64(vec![value as i64]),
        };
        Self {
            data,
            shape: Shape::from(()),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn elem_type(&self) -> ElemType {
        self.data.elem_type()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_f32(self) -> Option<Vec<f32>> {
        match self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_device(&self, device: &Device) -> Result<candle_core::Tensor> {
        let shape = self.shape.clone();
        let t = match &self.data {
            TensorData::F32(v) => candle_core::Tensor::from_vec(v.clone(), shape, device)?,
            TensorData::F64(v) => candle_core::Tensor::from_vec(v.clone(), shape, device)?,
            TensorData::I64(v) => candle_core::Tensor::from_vec(v.clone(), shape, device)?,
        };
        Ok(t)
    }

    /// Copies a device tensor back to the host.
    pub fn from_candle(t: &candle_core::Tensor) -> Result<Self> {
        let shape = t.shape().clone();
        let flat = t.flatten_all()?;
        let data = match t.dtype() {
            DType::F32 => TensorData::F32(flat.to_vec1::<f32>()?),
            DType::F64 => TensorData::F64(flat.to_vec1::<f64>()?),
            DType::I64 => TensorData::I64(flat.to_vec1::<i64>()?),
            other => return Err(Error::UnsupportedType(other.as_str().to_string())),
        };
        Self::new(data, shape)
    }

    pub fn from_proto(proto: &TensorProto) -> Result<Self> {
        if proto.data_location == DATA_LOCATION_EXTERNAL {
            return Err(Error::UnsupportedType(format!(
                "tensor '{}' stores its data externally",
                proto.name
            )));
        }
        let elem_type = ElemType::from_onnx(proto.data_type)?;
        let dims = proto
            .dims
            .iter()
            .map(|&d| {
                usize::try_from(d).map_err(|_| {
                    Error::validation(format!("tensor '{}' has negative dim {d}", proto.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        dims.iter()
            .try_fold(1usize, |count, &d| count.checked_mul(d))
            .ok_or_else(|| {
                Error::validation(format!(
                    "tensor '{}' dims {dims:?} overflow the element count",
                    proto.name
                ))
            })?;
        let shape = Shape::from(dims);

        let data = if !proto.raw_data.is_empty() {
            decode_raw(&proto.raw_data, elem_type, &proto.name)?
        } else {
            match elem_type {
                ElemType::F32 => TensorData::F32(proto.float_data.clone()),
                ElemType::F64 => TensorData::F64(proto.double_data.clone()),
                ElemType::I64 => TensorData::I64(proto.int64_data.clone()),
            }
        };
        Self::new(data, shape)
    }

    /// Encodes the tensor with little-endian `raw_data`.
    pub fn to_proto(&self, name: &str) -> TensorProto {
        let raw_data = match &self.data {
            TensorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        };
        TensorProto {
            dims: self.dims().iter().map(|&d| d as i64).collect(),
            data_type: self.elem_type().onnx_code(),
            name: name.to_string(),
            raw_data,
            ..Default::default()
        }
    }
}

fn decode_raw(raw: &[u8], elem_type: ElemType, name: &str) -> Result<TensorData> {
    let size = elem_type.size_in_bytes();
    if raw.len() % size != 0 {
        return Err(Error::validation(format!(
            "tensor '{name}' has {} raw bytes, not a multiple of {size}",
            raw.len()
        )));
    }
    let data = match elem_type {
        ElemType::F32 => TensorData::F32(
            raw.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        ElemType::F64 => TensorData::F64(
            raw.chunks_exact(8)
                .map(|c| f64::from_le_bytes(le8(c)))
                .collect(),
        ),
        ElemType::I64 => TensorData::I64(
            raw.chunks_exact(8)
                .map(|c| i64::from_le_bytes(le8(c)))
                .collect(),
        ),
    };
    Ok(data)
}

fn le8(chunk: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(chunk);
    buf
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            TensorData::F32(v) => write!(f, "{v:?}")?,
            TensorData::F64(v) => write!(f, "{v:?}")?,
            TensorData::I64(v) => write!(f, "{v:?}")?,
        }
        if self.shape.rank() > 1 {
            write!(f, " (shape {:?})", self.dims())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_element_count() {
        let err = Tensor::new(TensorData::F32(vec![1.0, 2.0, 3.0]), vec![2, 2]).unwrap_err();
        assert!(matches!(err, Error::ElementCount { len: 3, .. }));
        assert!(Tensor::new(TensorData::I64(vec![1, 2, 3, 4]), vec![2, 2]).is_ok());
    }

    #[test]
    fn test_vector_and_scalar_shapes() {
        let v = Tensor::vector(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(v.dims(), &[4]);
        assert_eq!(v.elem_type(), ElemType::F32);

        let s = Tensor::scalar(2.0, ElemType::F32);
        assert!(s.dims().is_empty());
        assert_eq!(s.as_f32(), Some(&[2.0f32][..]));
    }

    #[test]
    fn test_proto_raw_data_is_little_endian() {
        let proto = Tensor::scalar(2.0, ElemType::F32).to_proto("scale");
        assert_eq!(proto.raw_data, vec![0x00, 0x00, 0x00, 0x40]);
        assert_eq!(proto.data_type, data_type::FLOAT);
        assert!(proto.dims.is_empty());

        let back = Tensor::from_proto(&proto).unwrap();
        assert_eq!(back, Tensor::scalar(2.0, ElemType::F32));
    }

    #[test]
    fn test_proto_typed_fields() {
        let proto = TensorProto {
            dims: vec![3],
            data_type: data_type::INT64,
            int64_data: vec![-1, 0, 1],
            ..Default::default()
        };
        let t = Tensor::from_proto(&proto).unwrap();
        assert_eq!(t.data(), &TensorData::I64(vec![-1, 0, 1]));
    }

    #[test]
    fn test_proto_rejects_bad_payloads() {
        let short = TensorProto {
            dims: vec![2],
            data_type: data_type::FLOAT,
            raw_data: vec![0, 0, 0, 0, 0],
            ..Default::default()
        };
        assert!(Tensor::from_proto(&short).is_err());

        let half = TensorProto {
            data_type: data_type::FLOAT16,
            raw_data: vec![0, 0x40],
            ..Default::default()
        };
        assert!(matches!(
            Tensor::from_proto(&half),
            Err(Error::UnsupportedType(name)) if name == "float16"
        ));

        let external = TensorProto {
            data_type: data_type::FLOAT,
            data_location: DATA_LOCATION_EXTERNAL,
            ..Default::default()
        };
        assert!(Tensor::from_proto(&external).is_err());
    }

    #[test]
    fn test_proto_dims_overflow() {
        let huge = TensorProto {
            name: "huge".into(),
            dims: vec![1 << 40, 1 << 40],
            data_type: data_type::FLOAT,
            ..Default::default()
        };
        assert!(matches!(
            Tensor::from_proto(&huge),
            Err(Error::Validation(msg)) if msg.contains("overflow")
        ));
    }

    #[test]
    fn test_candle_roundtrip() {
        let t = Tensor::new(TensorData::F64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), vec![2, 3]).unwrap();
        let on_device = t.to_device(&Device::Cpu).unwrap();
        assert_eq!(on_device.dims(), &[2, 3]);
        assert_eq!(Tensor::from_candle(&on_device).unwrap(), t);
    }

    #[test]
    fn test_display() {
        assert_eq!(Tensor::vector(vec![2.0, 4.0]).to_string(), "[2.0, 4.0]");
    }
}
