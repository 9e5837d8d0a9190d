//! Inspect command implementation.

use super::{log_path, CliError, OutputFormat};
use onewriter_store::{FileBackend, LogStore, StoreConfig};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log file path.
    pub path: String,
    /// Log size in bytes.
    pub log_size: u64,
    /// Committed batches replayed.
    pub batches: u64,
    /// Live keys.
    pub key_count: usize,
    /// Bytes dropped from a torn tail while opening.
    pub repaired_bytes: u64,
    /// Live keys, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

/// Runs the inspect command.
///
/// Opening the store takes its lock and truncates a torn tail, as any
/// writer would.
pub fn run(
    path: &Path,
    show_keys: bool,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_keys)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }

    Ok(())
}

/// Opens the store at `path` and gathers its statistics.
pub fn inspect(path: &Path, show_keys: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let log = log_path(path);
    if !log.exists() {
        return Err(CliError::NotFound(path.to_path_buf()).into());
    }

    let store: LogStore<FileBackend> =
        LogStore::open_file(&log, StoreConfig::new().create_if_missing(false))?;
    let recovery = store.recovery();

    let keys = show_keys.then(|| {
        store
            .keys()
            .iter()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    });

    Ok(InspectResult {
        path: log.display().to_string(),
        log_size: store.log_len()?,
        batches: recovery.batches,
        key_count: store.len(),
        repaired_bytes: recovery.discarded,
        keys,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("onewriter Store Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Log:");
    println!("  Size:          {}", format_size(result.log_size));
    println!("  Batches:       {}", result.batches);
    if result.repaired_bytes > 0 {
        println!("  Repaired:      {} bytes dropped", result.repaired_bytes);
    }
    println!();
    println!("Keys:");
    println!("  Live keys:     {}", result.key_count);

    if let Some(keys) = &result.keys {
        for key in keys {
            println!("  - {key}");
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
