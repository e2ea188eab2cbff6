//! Exporting modules to ONNX files.

use std::path::{Path, PathBuf};

use crate::checker::check_model;
use crate::error::{Error, Result};
use crate::graph::{DEFAULT_OPSET_VERSION, model_from_graph};
use crate::model::Export;
use crate::proto::{Message, ModelProto};
use crate::session::{InferenceSession, SessionOptions};
use crate::signature::{Dim, ValueSignature};
use crate::tensor::{ElemType, Tensor};

pub const MODEL_FILE_NAME: &str = "double_vector.onnx";

/// Vector run through the module before export.
pub const SANITY_INPUT: [f32; 4] = [1.0, 2.0, 3.0, 4.0];

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub file_name: String,
    pub input_name: String,
    pub output_name: String,
    /// Name of the dynamic leading axis on both input and output.
    pub batch_axis: String,
    pub opset_version: i64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            file_name: MODEL_FILE_NAME.to_string(),
            input_name: "input".to_string(),
            output_name: "output".to_string(),
            batch_axis: "batch_size".to_string(),
            opset_version: DEFAULT_OPSET_VERSION,
        }
    }
}

impl ExportOptions {
    pub fn input_signature(&self) -> ValueSignature {
        ValueSignature::new(
            &self.input_name,
            ElemType::F32,
            vec![Dim::symbolic(&self.batch_axis)],
        )
    }

    pub fn output_signature(&self) -> ValueSignature {
        ValueSignature::new(
            &self.output_name,
            ElemType::F32,
            vec![Dim::symbolic(&self.batch_axis)],
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub bytes_written: usize,
    pub sanity_input: Tensor,
    pub sanity_output: Tensor,
}

/// Builds the ONNX model for `module` without touching the filesystem.
pub fn build_model<M: Export>(module: &M, options: &ExportOptions) -> Result<ModelProto> {
    let graph = module.to_graph(&options.input_signature(), &options.output_signature())?;
    Ok(model_from_graph(graph, options.opset_version))
}

/// Exports `module` to `<dir>/<options.file_name>` and validates the result.
///
/// `dir` must already exist. After writing, the file is read back, checked
/// structurally, its signatures compared with the declared ones, and the
/// sanity input replayed through it to confirm it matches the module.
pub fn export_model<M: Export>(module: &M, dir: &Path, options: &ExportOptions) -> Result<ExportReport> {
    let sanity_input = Tensor::vector(SANITY_INPUT.to_vec());
    let sanity_output = module.forward(&sanity_input)?;
    tracing::info!("Sanity check: {} -> {}", sanity_input, sanity_output);

    let model = build_model(module, options)?;
    let bytes = model.encode_to_vec();
    let path = dir.join(&options.file_name);
    std::fs::write(&path, &bytes)?;
    tracing::info!("Model saved: {} ({} bytes)", path.display(), bytes.len());

    verify_export(&path, options, &sanity_input, &sanity_output)?;

    Ok(ExportReport {
        path,
        bytes_written: bytes.len(),
        sanity_input,
        sanity_output,
    })
}

fn verify_export(
    path: &Path,
    options: &ExportOptions,
    sanity_input: &Tensor,
    expected: &Tensor,
) -> Result<()> {
    let reloaded = ModelProto::decode(&std::fs::read(path)?)?;
    check_model(&reloaded)?;

    let graph = reloaded
        .graph
        .as_ref()
        .ok_or_else(|| Error::validation("reloaded model has no graph"))?;
    let declared = [
        (&graph.input, options.input_signature()),
        (&graph.output, options.output_signature()),
    ];
    for (infos, want) in declared {
        let got = infos
            .iter()
            .map(ValueSignature::from_value_info)
            .collect::<Result<Vec<_>>>()?;
        if got != [want.clone()] {
            return Err(Error::validation(format!(
                "reloaded signature {got:?} differs from declared {want}"
            )));
        }
    }

    let session = InferenceSession::from_model(&reloaded, &SessionOptions::cpu())?;
    let actual = session.run_single(sanity_input)?;
    if &actual != expected {
        return Err(Error::ParityMismatch {
            expected: expected.as_f32().map(<[f32]>::to_vec).unwrap_or_default(),
            actual: actual.as_f32().map(<[f32]>::to_vec).unwrap_or_default(),
        });
    }
    tracing::debug!("Reloaded model reproduces the module output");
    Ok(())
}
