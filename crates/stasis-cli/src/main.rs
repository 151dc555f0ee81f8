//! Stasis command-line tool
//!
//! Inspect, verify and generate snapshot files.

mod commands;
mod demo;
mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stasis_core::SnapshotOptions;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "stasis")]
#[command(about = "Object graph snapshot tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Snapshot options file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and section summary of a snapshot file
    Inspect {
        /// Snapshot file
        file: PathBuf,
    },

    /// Check a snapshot file for corruption
    Verify {
        /// Snapshot file
        file: PathBuf,
        /// Also restore it against the demo program
        #[arg(long)]
        restore: bool,
    },

    /// Write a demo snapshot with shared and cyclic state
    Sample {
        /// Output file
        out: PathBuf,
    },
}

fn load_options(path: Option<&Path>) -> anyhow::Result<SnapshotOptions> {
    let options = match path {
        Some(path) => SnapshotOptions::from_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => SnapshotOptions::default(),
    };
    Ok(options.with_env_overrides()?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let options = load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { file } => commands::inspect::execute(&file, &options),
        Commands::Verify { file, restore } => commands::verify::execute(&file, restore, &options),
        Commands::Sample { out } => commands::sample::execute(&out, &options),
    }
}
