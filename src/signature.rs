//! Declared graph inputs and outputs.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::proto::{Dimension, TensorShapeProto, TensorTypeProto, TypeProto, ValueInfoProto};
use crate::tensor::{ElemType, Tensor, onnx_type_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    Fixed(usize),
    /// Named dynamic axis; every occurrence of the same name must agree
    /// within one run.
    Symbolic(String),
    Any,
}

impl Dim {
    pub fn symbolic(name: impl Into<String>) -> Self {
        Dim::Symbolic(name.into())
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Symbolic(name) => f.write_str(name),
            Dim::Any => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSignature {
    pub name: String,
    pub elem_type: ElemType,
    /// `None` when the graph does not declare a shape at all.
    pub dims: Option<Vec<Dim>>,
}

impl ValueSignature {
    pub fn new(name: impl Into<String>, elem_type: ElemType, dims: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            elem_type,
            dims: Some(dims),
        }
    }

    pub fn from_value_info(info: &ValueInfoProto) -> Result<Self> {
        let tensor_type = info.tensor_type().ok_or_else(|| {
            Error::validation(format!("value '{}' is not a tensor", info.name))
        })?;
        let elem_type = ElemType::from_onnx(tensor_type.elem_type)?;
        let dims = match &tensor_type.shape {
            None => None,
            Some(shape) => Some(
                shape
                    .dim
                    .iter()
                    .map(|d| match d {
                        Dimension::Value(v) => usize::try_from(*v).map(Dim::Fixed).map_err(|_| {
                            Error::validation(format!("value '{}' has negative dim {v}", info.name))
                        }),
                        Dimension::Param(p) => Ok(Dim::Symbolic(p.clone())),
                        Dimension::Unknown => Ok(Dim::Any),
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(Self {
            name: info.name.clone(),
            elem_type,
            dims,
        })
    }

    pub fn to_value_info(&self) -> ValueInfoProto {
        let shape = self.dims.as_ref().map(|dims| TensorShapeProto {
            dim: dims
                .iter()
                .map(|d| match d {
                    Dim::Fixed(n) => Dimension::Value(*n as i64),
                    Dim::Symbolic(name) => Dimension::Param(name.clone()),
                    Dim::Any => Dimension::Unknown,
                })
                .collect(),
        });
        ValueInfoProto {
            name: self.name.clone(),
            r#type: Some(TypeProto {
                tensor_type: Some(TensorTypeProto {
                    elem_type: self.elem_type.onnx_code(),
                    shape,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Axes declared with a symbolic name, e.g. `[(0, "batch_size")]`.
    pub fn dynamic_axes(&self) -> Vec<(usize, &str)> {
        self.dims
            .iter()
            .flatten()
            .enumerate()
            .filter_map(|(axis, d)| match d {
                Dim::Symbolic(name) => Some((axis, name.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Checks `tensor` against this signature, binding symbolic dims in
    /// `bindings` as they are first seen.
    pub fn check(&self, tensor: &Tensor, bindings: &mut HashMap<String, usize>) -> Result<()> {
        if tensor.elem_type() != self.elem_type {
            return Err(Error::TypeMismatch {
                name: self.name.clone(),
                expected: self.elem_type.to_string(),
                actual: tensor.elem_type().to_string(),
            });
        }
        let Some(dims) = &self.dims else {
            return Ok(());
        };
        let actual = tensor.dims();
        let mismatch = || Error::ShapeMismatch {
            name: self.name.clone(),
            expected: self.shape_string(),
            actual: actual.to_vec(),
        };
        if dims.len() != actual.len() {
            return Err(mismatch());
        }
        for (dim, &size) in dims.iter().zip(actual) {
            match dim {
                Dim::Fixed(n) if *n != size => return Err(mismatch()),
                Dim::Symbolic(name) => {
                    let bound = *bindings.entry(name.clone()).or_insert(size);
                    if bound != size {
                        return Err(mismatch());
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn shape_string(&self) -> String {
        match &self.dims {
            None => "[unknown rank]".to_string(),
            Some(dims) => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for ValueSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{}",
            self.name,
            onnx_type_name(self.elem_type.onnx_code()),
            self.shape_string()
        )
    }
}
