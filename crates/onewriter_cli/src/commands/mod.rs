//! CLI command implementations.

pub mod inspect;
pub mod stress;
pub mod verify;

use clap::ValueEnum;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the log file inside a store directory.
pub const LOG_FILE: &str = "writes.log";

/// How a command prints its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Failures reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs `--path`.
    #[error("store path required for {0}")]
    PathRequired(&'static str),

    /// No log exists where one was expected.
    #[error("no store found at {}", .0.display())]
    NotFound(PathBuf),

    /// A stress run observed two writers at once.
    #[error("exclusion violated: {busy} busy errors, {overlaps} overlapping tasks")]
    ExclusionViolated {
        /// Busy errors seen.
        busy: usize,
        /// Overlapping task executions seen.
        overlaps: usize,
    },

    /// The log holds a torn or corrupt tail.
    #[error("log verification failed: {0} trailing bytes are not a valid batch")]
    VerifyFailed(u64),
}

/// Returns the log file of the store at `dir`.
pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}
