//! Verify command implementation.

use super::open_existing;
use binlog_core::{Binlog, TailState};
use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of records read back.
    pub records_checked: u64,
    /// Why the recovery scan stopped.
    pub tail: TailState,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Returns true if the log ends cleanly and every record read back.
    pub fn is_ok(&self) -> bool {
        self.tail.is_clean() && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying binlog at {}", path.display());
    println!();

    let log = open_existing(path)?;
    let result = verify(&log);
    log.close()?;

    println!("  Records checked: {}", result.records_checked);
    println!("  Tail: {}", result.tail);
    for error in &result.errors {
        println!("  Error: {}", error);
    }

    println!();
    if result.is_ok() {
        println!("✓ Binlog verification passed");
        Ok(())
    } else {
        println!("✗ Binlog verification failed");
        Err("Verification failed".into())
    }
}

/// Reads every record of an open log.
pub fn verify(log: &Binlog) -> VerifyResult {
    let mut result = VerifyResult {
        records_checked: 0,
        tail: log.tail_state().clone(),
        errors: Vec::new(),
    };

    for entry in log.iter() {
        match entry {
            Ok(_) => result.records_checked += 1,
            Err(e) => result.errors.push(e.to_string()),
        }
    }

    if result.records_checked != log.record_count() {
        result.errors.push(format!(
            "scan found {} records, read back {}",
            log.record_count(),
            result.records_checked
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use binlog_core::{BinlogConfig, BlobKey, RecordView};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn clean_log_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.binlog");
        let mut log = Binlog::open(BinlogConfig::new(&path).unwrap().with_prealloc_step(4096))
            .unwrap();
        log.append(&RecordView::remove(BlobKey::default())).unwrap();
        log.close().unwrap();

        let log = open_existing(&path).unwrap();
        let result = verify(&log);
        log.close().unwrap();

        assert!(result.is_ok());
        assert_eq!(result.records_checked, 1);
        assert!(run(&path).is_ok());
    }

    #[test]
    fn torn_tail_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.binlog");
        let config = BinlogConfig::new(&path).unwrap().with_preallocation(false);
        let mut log = Binlog::open(config).unwrap();
        log.append(&RecordView::remove(BlobKey::default())).unwrap();
        log.close().unwrap();

        let torn = RecordView::put(BlobKey::default(), vec![1u8; 64]).header();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(&torn.encode()[..50]).unwrap();
        drop(file);

        let log = open_existing(&path).unwrap();
        let result = verify(&log);
        log.close().unwrap();

        assert!(!result.is_ok());
        assert_eq!(result.records_checked, 1);
        assert!(matches!(result.tail, TailState::Truncated { offset: 160 }));
        assert!(run(&path).is_err());
    }
}
