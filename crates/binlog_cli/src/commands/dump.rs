//! Dump command implementation.

use super::open_existing;
use binlog_core::{Binlog, RecordView};
use serde::Serialize;
use std::path::Path;

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// LSN of the record.
    pub lsn: u64,
    /// Record type.
    pub record_type: String,
    /// Blob key, hex-encoded.
    pub key: String,
    /// Metadata size in bytes.
    pub meta_size: usize,
    /// Payload size in bytes.
    pub payload_size: usize,
    /// Total frame size in bytes.
    pub frame_size: u64,
}

impl RecordInfo {
    fn new(lsn: u64, record: &RecordView) -> Self {
        Self {
            lsn,
            record_type: record.record_type().name().to_string(),
            key: record.key().to_hex(),
            meta_size: record.meta().len(),
            payload_size: record.payload().len(),
            frame_size: record.frame_size(),
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    start: Option<u64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_existing(path)?;
    let records = read_records(&log, start, limit);
    log.close()?;
    let records = records?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads up to `limit` records starting at `start`.
pub fn read_records(
    log: &Binlog,
    start: Option<u64>,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let iter = match start {
        Some(lsn) => log.iter_from(lsn)?,
        None => log.iter(),
    };

    let mut records = Vec::new();
    for entry in iter.take(limit.unwrap_or(usize::MAX)) {
        let (lsn, record) = entry?;
        records.push(RecordInfo::new(lsn, &record));
    }
    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    println!(
        "{:>12}  {:<8}  {:<12}  {:>10}  {:>10}",
        "LSN", "TYPE", "KEY", "META", "PAYLOAD"
    );
    println!("{}", "-".repeat(60));

    for record in records {
        println!(
            "{:>12}  {:<8}  {:<12}  {:>10}  {:>10}",
            record.lsn,
            record.record_type,
            &record.key[..12],
            record.meta_size,
            record.payload_size
        );
    }

    println!();
    println!("Total: {} records", records.len());
}
