//! Nanopolish SLURM wrapper CLI
//!
//! Entry point for the `nanopolish-slurm` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use nanopolish_slurm::{EffectiveConfig, Pipeline, RunInputs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nanopolish-slurm")]
#[command(about = "Polish an assembly with Nanopolish, one SLURM job per region", version)]
struct Cli {
    /// Draft assembly (FASTA)
    assembly: PathBuf,

    /// Reads the assembly was built from
    reads: PathBuf,

    /// Directory of raw signal (fast5) files
    fast5_dir: PathBuf,

    /// Directory for the workspace and the polished assembly
    output_dir: PathBuf,

    /// Nanopolish installation directory
    nanopolish_dir: PathBuf,

    /// Threads for read alignment
    threads: u32,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanopolish_slurm=info,polish_region=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match EffectiveConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let pipeline = match Pipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    let inputs = RunInputs {
        assembly: cli.assembly,
        reads: cli.reads,
        signal_dir: cli.fast5_dir,
        output_dir: cli.output_dir,
        nanopolish_dir: cli.nanopolish_dir,
        threads: cli.threads,
    };

    match pipeline.run(&inputs) {
        Ok(outcome) => {
            println!("{}", outcome.final_assembly.display());
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
