//! Export command

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config;
use crate::export::{ExportOptions, SANITY_INPUT, export_model};
use crate::model::Module;
use crate::scale::Scale;
use crate::tensor::Tensor;

/// Export the doubling model and validate the written file
pub fn export(output_dir: Option<PathBuf>, file_name: String) -> Result<()> {
    let dir = output_dir.unwrap_or_else(config::model_dir);
    let options = ExportOptions {
        file_name,
        ..Default::default()
    };
    let module = Scale::doubling();

    // Shown before anything is written so a failed export still reports it
    let input = Tensor::vector(SANITY_INPUT.to_vec());
    let output = module.forward(&input).context("sanity check failed")?;
    println!("input: {}", input);
    println!("output: {}", output);

    let report = export_model(&module, &dir, &options)
        .with_context(|| format!("failed to export model into {}", dir.display()))?;

    println!("Model saved: {}", report.path.display());
    println!("Model is valid");

    Ok(())
}
