//! CLI command implementations.

pub mod append;
pub mod dump;
pub mod inspect;
pub mod verify;

use binlog_core::{Binlog, BinlogConfig, BinlogFlags, DiskHeader};
use binlog_storage::FileBackend;
use std::path::Path;

/// Opens an existing log read-only with the flags recorded in its header.
///
/// Closing the returned log leaves the file as it was.
pub fn open_existing(path: &Path) -> Result<Binlog, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No binlog found at {}", path.display()).into());
    }

    let flags = persisted_flags(path)?;
    let config = BinlogConfig::new(path)?.with_flags(flags);
    Ok(Binlog::open_read_only(config)?)
}

/// Reads the flags recorded in a log's header without locking it.
pub fn persisted_flags(path: &Path) -> Result<BinlogFlags, Box<dyn std::error::Error>> {
    let backend = FileBackend::open(path, false)?;
    Ok(DiskHeader::read(&backend)?.flags())
}

/// Returns the names of the set flags.
pub fn flag_names(flags: BinlogFlags) -> Vec<String> {
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect()
}
