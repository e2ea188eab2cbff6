//! CLI commands
//!
//! `export` writes the model, `run` executes it once, `info` describes a
//! model file.

mod export;
mod info;
mod run;

pub use export::export;
pub use info::info;
pub use run::run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::export::MODEL_FILE_NAME;
use crate::provider::ExecutionProvider;

/// double-vector - export and run a multiply-by-two ONNX model
#[derive(Parser)]
#[command(name = "double-vector")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the model and validate the written file
    Export {
        /// Output directory (default: $DOUBLE_VECTOR_MODEL_DIR or ../public/models).
        /// Must already exist.
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// File name inside the output directory
        #[arg(long, default_value = MODEL_FILE_NAME)]
        file_name: String,
    },

    /// Run the model once and print input and output
    Run {
        /// Model path (default: <model dir>/double_vector.onnx)
        #[arg(long, short)]
        model: Option<PathBuf>,

        /// Comma-separated input values (default: 1,2,3,4,5,6)
        #[arg(long, short, num_args = 1, value_delimiter = ',', allow_hyphen_values = true)]
        input: Option<Vec<f32>>,

        /// Execution providers to try in order: cuda, cuda:N, cpu.
        /// Default: cuda:0 then cpu.
        #[arg(long = "device", value_delimiter = ',')]
        devices: Vec<ExecutionProvider>,
    },

    /// Show model information
    Info {
        /// Model path (default: <model dir>/double_vector.onnx)
        #[arg(long, short)]
        model: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["double-vector", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                model,
                input,
                devices,
            } => {
                assert!(model.is_none());
                assert!(input.is_none());
                assert!(devices.is_empty());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_parses_vectors_and_devices() {
        let cli = Cli::try_parse_from([
            "double-vector",
            "run",
            "--input=-1.5,2,3e2",
            "--device",
            "cuda:1,cpu",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { input, devices, .. } => {
                assert_eq!(input, Some(vec![-1.5, 2.0, 300.0]));
                assert_eq!(
                    devices,
                    vec![ExecutionProvider::Cuda(1), ExecutionProvider::Cpu]
                );
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_rejects_non_numeric_input() {
        assert!(Cli::try_parse_from(["double-vector", "run", "--input", "1,two,3"]).is_err());
        assert!(Cli::try_parse_from(["double-vector", "run", "--device", "webgpu"]).is_err());
    }

    #[test]
    fn test_export_defaults() {
        let cli = Cli::try_parse_from(["double-vector", "export"]).unwrap();
        match cli.command {
            Commands::Export {
                output_dir,
                file_name,
            } => {
                assert!(output_dir.is_none());
                assert_eq!(file_name, "double_vector.onnx");
            }
            _ => panic!("expected export"),
        }
    }
}
