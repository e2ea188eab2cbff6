use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use double_vector::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "double_vector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            output_dir,
            file_name,
        } => {
            double_vector::cli::export(output_dir, file_name)?;
        }
        Commands::Run {
            model,
            input,
            devices,
        } => {
            double_vector::cli::run(model, input, devices)?;
        }
        Commands::Info { model } => {
            double_vector::cli::info(model)?;
        }
    }

    Ok(())
}
