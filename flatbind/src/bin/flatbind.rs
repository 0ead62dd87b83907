//! CLI entry point for flatbind.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// flatbind — generate flat wrappers and registration tables from an
/// analyzed C++ program model.
#[derive(Parser, Debug)]
#[command(name = "flatbind", version, about)]
struct Cli {
    /// Path to the flatbind.toml configuration file.
    #[arg(default_value = "flatbind.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("flatbind=info")),
        )
        .init();

    let cli = Cli::parse();
    flatbind::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
