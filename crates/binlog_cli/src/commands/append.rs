//! Append command implementation.

use super::persisted_flags;
use binlog_core::{Binlog, BinlogConfig, BlobKey, RecordType, RecordView};
use clap::ValueEnum;
use std::path::Path;

/// Record type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    /// Update a blob
    Put,
    /// Remove a blob
    Remove,
}

impl From<TypeArg> for RecordType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Put => RecordType::Put,
            TypeArg::Remove => RecordType::Remove,
        }
    }
}

/// A record to append.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    /// Record type.
    pub record_type: TypeArg,
    /// Hex-encoded key.
    pub key: String,
    /// Metadata.
    pub meta: String,
    /// Payload.
    pub payload: String,
    /// Open with forced-synchronous writes.
    pub sync: bool,
    /// Preallocation step for a new log.
    pub prealloc_step: Option<u64>,
}

/// Runs the append command.
pub fn run(path: &Path, request: &AppendRequest) -> Result<(), Box<dyn std::error::Error>> {
    let lsn = append(path, request)?;
    println!("Appended {} record at LSN {}", RecordType::from(request.record_type), lsn);
    Ok(())
}

/// Appends the requested record and returns its LSN.
pub fn append(path: &Path, request: &AppendRequest) -> Result<u64, Box<dyn std::error::Error>> {
    let record = RecordView::new(request.record_type.into(), BlobKey::from_hex(&request.key)?)
        .with_meta(request.meta.clone().into_bytes())
        .with_payload(request.payload.clone().into_bytes());

    let mut config = BinlogConfig::new(path)?;
    if path.exists() {
        config = config.with_flags(persisted_flags(path)?);
    } else if let Some(step) = request.prealloc_step {
        config = if step == 0 {
            config.with_preallocation(false)
        } else {
            config.with_prealloc_step(step)
        };
    }
    if request.sync {
        config = config.with_sync(true);
    }

    let mut log = Binlog::open(config)?;
    let appended = log.append(&record);
    log.close()?;
    Ok(appended?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{dump, open_existing};
    use tempfile::tempdir;

    fn request(record_type: TypeArg, payload: &str) -> AppendRequest {
        AppendRequest {
            record_type,
            key: "0102".to_string(),
            meta: String::new(),
            payload: payload.to_string(),
            sync: false,
            prealloc_step: Some(4096),
        }
    }

    #[test]
    fn appends_to_new_and_existing_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cli.binlog");

        assert_eq!(append(&path, &request(TypeArg::Put, "hello")).unwrap(), 64);
        assert_eq!(
            append(&path, &request(TypeArg::Remove, "")).unwrap(),
            64 + 96 + 5
        );

        let log = open_existing(&path).unwrap();
        let records = dump::read_records(&log, None, None).unwrap();
        log.close().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload_size, 5);
        assert!(records[0].key.starts_with("0102"));
        assert_eq!(records[1].record_type, "remove");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn keeps_persisted_flags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flags.binlog");

        let mut first = request(TypeArg::Put, "x");
        first.sync = true;
        first.prealloc_step = Some(0);
        append(&path, &first).unwrap();
        append(&path, &request(TypeArg::Put, "y")).unwrap();

        let flags = persisted_flags(&path).unwrap();
        assert_eq!(flags, binlog_core::BinlogFlags::SYNC);
    }

    #[test]
    fn bad_key_rejected() {
        let dir = tempdir().unwrap();
        let mut req = request(TypeArg::Put, "x");
        req.key = "not hex".to_string();

        assert!(append(&dir.path().join("bad.binlog"), &req).is_err());
    }
}
