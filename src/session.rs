//! Loading and running ONNX models on ONNX Runtime.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use ort::session::Session;
use ort::value::DynValue;

use crate::checker::check_model;
use crate::error::{Error, Result};
use crate::proto::{Message, ModelProto};
use crate::provider::{ExecutionProvider, open_session};
use crate::signature::ValueSignature;
use crate::tensor::{ElemType, Tensor, TensorData};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Providers to try, in order.
    pub providers: Vec<ExecutionProvider>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            providers: ExecutionProvider::defaults(),
        }
    }
}

impl SessionOptions {
    pub fn cpu() -> Self {
        Self {
            providers: vec![ExecutionProvider::Cpu],
        }
    }
}

/// A validated model loaded into ONNX Runtime.
///
/// The file is decoded and checked before the runtime sees it, so corrupt
/// artifacts fail with [`Error::Decode`] or [`Error::Validation`].
pub struct InferenceSession {
    provider: ExecutionProvider,
    session: Session,
    inputs: Vec<ValueSignature>,
    outputs: Vec<ValueSignature>,
    /// Inputs backed by an initializer, which may be left unfed.
    optional: HashSet<String>,
}

impl fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceSession")
            .field("provider", &self.provider)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl InferenceSession {
    pub fn from_file<P: AsRef<Path>>(path: P, options: &SessionOptions) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading model from {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, options)
    }

    pub fn from_bytes(bytes: &[u8], options: &SessionOptions) -> Result<Self> {
        let model = ModelProto::decode(bytes)?;
        Self::load(&model, bytes, options)
    }

    pub fn from_model(model: &ModelProto, options: &SessionOptions) -> Result<Self> {
        Self::load(model, &model.encode_to_vec(), options)
    }

    fn load(model: &ModelProto, bytes: &[u8], options: &SessionOptions) -> Result<Self> {
        check_model(model)?;
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| Error::validation("model has no graph"))?;

        let inputs = graph
            .input
            .iter()
            .map(ValueSignature::from_value_info)
            .collect::<Result<Vec<_>>>()?;
        let outputs = graph
            .output
            .iter()
            .map(ValueSignature::from_value_info)
            .collect::<Result<Vec<_>>>()?;
        let optional = graph
            .initializer
            .iter()
            .map(|init| init.name.clone())
            .filter(|name| inputs.iter().any(|sig| &sig.name == name))
            .collect();

        let (provider, session) = open_session(&options.providers, bytes)?;

        tracing::info!(
            "Session ready on {}: {} inputs, {} outputs, {} nodes",
            provider,
            inputs.len(),
            outputs.len(),
            graph.node.len()
        );

        Ok(Self {
            provider,
            session,
            inputs,
            outputs,
            optional,
        })
    }

    pub fn provider(&self) -> ExecutionProvider {
        self.provider
    }

    /// Declared graph inputs, including ones backed by an initializer.
    pub fn inputs(&self) -> &[ValueSignature] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueSignature] {
        &self.outputs
    }

    /// Runs the graph and returns every declared output, in order.
    ///
    /// Inputs backed by an initializer may be omitted; feeding them overrides
    /// the stored value.
    pub fn run(&self, feeds: &[(&str, &Tensor)]) -> Result<Vec<(String, Tensor)>> {
        let mut bindings = HashMap::new();
        let mut values: Vec<(String, DynValue)> = Vec::with_capacity(feeds.len());

        for &(name, tensor) in feeds {
            let sig = self
                .inputs
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| Error::UnknownInput(name.to_string()))?;
            sig.check(tensor, &mut bindings)?;
            values.push((sig.name.clone(), to_ort_value(tensor)?));
        }
        for sig in &self.inputs {
            let fed = values.iter().any(|(name, _)| *name == sig.name);
            if !fed && !self.optional.contains(&sig.name) {
                return Err(Error::MissingInput(sig.name.clone()));
            }
        }

        let produced = self.session.run(values)?;

        let mut results = Vec::with_capacity(self.outputs.len());
        for sig in &self.outputs {
            let value = produced
                .get(sig.name.as_str())
                .ok_or_else(|| Error::validation(format!("output '{}' was not produced", sig.name)))?;
            let tensor = from_ort_value(value, sig.elem_type)?;
            sig.check(&tensor, &mut bindings)?;
            results.push((sig.name.clone(), tensor));
        }
        Ok(results)
    }

    /// Feeds `input` to the only required graph input and returns the first
    /// output.
    pub fn run_single(&self, input: &Tensor) -> Result<Tensor> {
        let required: Vec<&ValueSignature> = self
            .inputs
            .iter()
            .filter(|sig| !self.optional.contains(&sig.name))
            .collect();
        let [sig] = required.as_slice() else {
            return Err(Error::validation(format!(
                "model has {} required inputs, expected exactly one",
                required.len()
            )));
        };
        self.run(&[(sig.name.as_str(), input)])?
            .into_iter()
            .next()
            .map(|(_, t)| t)
            .ok_or_else(|| Error::validation("model produced no outputs"))
    }
}

fn to_ort_value(tensor: &Tensor) -> Result<DynValue> {
    let dims: Vec<i64> = tensor.dims().iter().map(|&d| d as i64).collect();
    let value = match tensor.data() {
        TensorData::F32(v) => ort::value::Tensor::from_array((dims, v.clone()))?.into_dyn(),
        TensorData::F64(v) => ort::value::Tensor::from_array((dims, v.clone()))?.into_dyn(),
        TensorData::I64(v) => ort::value::Tensor::from_array((dims, v.clone()))?.into_dyn(),
    };
    Ok(value)
}

fn from_ort_value(value: &DynValue, elem_type: ElemType) -> Result<Tensor> {
    let (shape, data) = match elem_type {
        ElemType::F32 => {
            let (shape, data) = value.try_extract_raw_tensor::<f32>()?;
            (shape, TensorData::F32(data.to_vec()))
        }
        ElemType::F64 => {
            let (shape, data) = value.try_extract_raw_tensor::<f64>()?;
            (shape, TensorData::F64(data.to_vec()))
        }
        ElemType::I64 => {
            let (shape, data) = value.try_extract_raw_tensor::<i64>()?;
            (shape, TensorData::I64(data.to_vec()))
        }
    };
    let dims = shape
        .iter()
        .map(|&d| {
            usize::try_from(d)
                .map_err(|_| Error::validation(format!("runtime returned negative dim {d}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Tensor::new(data, dims)
}
