//! onewriter CLI
//!
//! Command-line tools for exercising the exclusive writer and maintaining
//! its append-log store.
//!
//! # Commands
//!
//! - `stress` - Hammer a store from many threads through one writer
//! - `inspect` - Display store statistics
//! - `verify` - Check a log for torn or corrupt batches
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::{CliError, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exclusive writer stress and store maintenance tools.
#[derive(Parser)]
#[command(name = "onewriter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent writes against a store
    Stress {
        /// Number of submitting threads
        #[arg(short, long, default_value_t = 8)]
        writers: usize,

        /// Tasks submitted by each thread
        #[arg(short, long, default_value_t = 1000)]
        tasks: usize,

        /// Make every n-th task fail and roll back
        #[arg(long)]
        fail_every: Option<usize>,

        /// Bypass the writer and open transactions directly
        #[arg(long)]
        direct: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Display store statistics
    Inspect {
        /// List live keys
        #[arg(short, long)]
        keys: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Verify log integrity without modifying it
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Stress {
            writers,
            tasks,
            fail_every,
            direct,
            format,
        } => {
            let path = cli.path.ok_or(CliError::PathRequired("stress"))?;
            let options = commands::stress::StressOptions {
                writers,
                tasks,
                fail_every,
                direct,
            };
            commands::stress::run(&path, &options, format)?;
        }
        Commands::Inspect { keys, format } => {
            let path = cli.path.ok_or(CliError::PathRequired("inspect"))?;
            commands::inspect::run(&path, keys, format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or(CliError::PathRequired("verify"))?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("onewriter CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("onewriter core v{}", onewriter_core::VERSION);
        }
    }

    Ok(())
}
