//! Cadence CLI - run processing chains over WAV files.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about = "Cadence processing chain host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a WAV file through a chain file
    Process(commands::process::ProcessArgs),

    /// Validate and prepare a chain file, then print its layout
    Check(commands::check::CheckArgs),

    /// List available stage types and their parameters
    Stages(commands::stages::StagesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => commands::process::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Stages(args) => commands::stages::run(args),
    }
}
