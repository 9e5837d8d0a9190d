//! Verify command implementation.

use super::{log_path, CliError};
use onewriter_store::log::{scan, Recovery};
use std::path::Path;

/// Runs the verify command.
///
/// Reads the log without locking or repairing it, so a store that is open
/// elsewhere can be checked.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let log = log_path(path);
    println!("Verifying log at {}", log.display());
    println!();

    let report = verify(path)?;
    println!("Batches:     {}", report.batches);
    println!("Valid bytes: {}", report.valid_len);

    println!();
    if report.discarded == 0 {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("Invalid tail: {} bytes", report.discarded);
        println!("✗ Log verification failed");
        Err(CliError::VerifyFailed(report.discarded).into())
    }
}

/// Scans the log of the store at `path`.
pub fn verify(path: &Path) -> Result<Recovery, Box<dyn std::error::Error>> {
    let log = log_path(path);
    if !log.exists() {
        return Err(CliError::NotFound(path.to_path_buf()).into());
    }
    let bytes = std::fs::read(&log)?;
    Ok(scan(&bytes))
}
