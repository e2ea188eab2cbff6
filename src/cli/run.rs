//! Run command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::config;
use crate::provider::ExecutionProvider;
use crate::session::{InferenceSession, SessionOptions};
use crate::tensor::Tensor;

const DEFAULT_INPUT: [f32; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

/// Load a model, run it once on `input` and print the result
pub fn run(
    model: Option<PathBuf>,
    input: Option<Vec<f32>>,
    devices: Vec<ExecutionProvider>,
) -> Result<()> {
    let path = model.unwrap_or_else(config::default_model_path);
    let options = if devices.is_empty() {
        SessionOptions::default()
    } else {
        SessionOptions { providers: devices }
    };

    let start = Instant::now();
    let session = InferenceSession::from_file(&path, &options)
        .with_context(|| format!("failed to load model from {}", path.display()))?;
    tracing::info!(
        "Model loaded in {:.2}ms on {}",
        start.elapsed().as_secs_f64() * 1000.0,
        session.provider()
    );

    let input = Tensor::vector(input.unwrap_or_else(|| DEFAULT_INPUT.to_vec()));

    let start = Instant::now();
    let output = session
        .run_single(&input)
        .context("inference failed")?;
    tracing::info!(
        "Inference took {:.3}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    println!("Input: {}", input);
    println!("Output: {}", output);

    Ok(())
}
