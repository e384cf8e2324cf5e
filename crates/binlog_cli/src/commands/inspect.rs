//! Inspect command implementation.

use super::{flag_names, open_existing};
use binlog_core::Binlog;
use serde::Serialize;
use std::path::Path;

/// Binlog inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Binlog path.
    pub path: String,
    /// On-disk format version.
    pub version: u16,
    /// Flags recorded in the header.
    pub flags: Vec<String>,
    /// File size in bytes.
    pub file_size: u64,
    /// LSN the next record would be written at.
    pub append_position: u64,
    /// Bytes used by records.
    pub used_bytes: u64,
    /// Number of records.
    pub record_count: u64,
    /// Why the recovery scan stopped.
    pub tail: String,
}

impl InspectResult {
    /// Collects the inspection data from an open log.
    pub fn collect(log: &Binlog) -> Result<Self, Box<dyn std::error::Error>> {
        let file_size = std::fs::metadata(log.path())?.len();

        Ok(Self {
            path: log.path().display().to_string(),
            version: log.header().version,
            flags: flag_names(log.header().flags()),
            file_size,
            append_position: log.append_position(),
            used_bytes: log.append_position() - binlog_core::HEADER_SIZE as u64,
            record_count: log.record_count(),
            tail: log.tail_state().to_string(),
        })
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_existing(path)?;
    let result = InspectResult::collect(&log);
    log.close()?;
    let result = result?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Binlog: {}", result.path);
    println!();
    println!("Header:");
    println!("  Version: {}", result.version);
    println!(
        "  Flags: {}",
        if result.flags.is_empty() {
            "none".to_string()
        } else {
            result.flags.join(", ")
        }
    );
    println!();
    println!("Storage:");
    println!("  File size: {}", format_bytes(result.file_size));
    println!("  Used: {}", format_bytes(result.used_bytes));
    println!("  Next LSN: {}", result.append_position);
    println!();
    println!("Records: {}", result.record_count);
    println!("Tail: {}", result.tail);
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
