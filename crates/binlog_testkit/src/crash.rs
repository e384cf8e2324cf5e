//! Crash recovery testing for the binlog.
//!
//! Simulates a failure at each step of an append, then drops the handle
//! without closing it (the "crash") and reopens the file. A correct log
//! never advances its append position for the failed record, and neither
//! replay nor recovery ever sees it.
//!
//! ## Usage
//!
//! ```rust
//! use binlog_testkit::crash::{CrashHarness, CrashPoint};
//!
//! let mut harness = CrashHarness::with_temp_dir().unwrap();
//! let result = harness.run(CrashPoint::PayloadWrite, 5);
//! assert!(result.passed, "{:?}", result.error);
//! ```

use crate::fixtures::{sample_records, test_key, TEST_PREALLOC_STEP};
use binlog_core::{Binlog, BinlogConfig, BinlogResult, RecordView};
use binlog_storage::{FaultHandle, FaultyBackend, FileBackend};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Points at which an append can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// The record header write fails.
    HeaderWrite,
    /// The metadata write fails.
    MetaWrite,
    /// The payload write fails.
    PayloadWrite,
    /// The payload write transfers only part of the payload.
    ShortPayloadWrite,
    /// Every write succeeds but the data flush fails.
    Flush,
    /// The file cannot be grown for the record.
    Preallocation,
}

impl CrashPoint {
    /// Every crash point.
    pub const ALL: [CrashPoint; 6] = [
        CrashPoint::HeaderWrite,
        CrashPoint::MetaWrite,
        CrashPoint::PayloadWrite,
        CrashPoint::ShortPayloadWrite,
        CrashPoint::Flush,
        CrashPoint::Preallocation,
    ];

    fn arm(self, faults: &FaultHandle) {
        match self {
            CrashPoint::HeaderWrite => faults.fail_nth_write(1),
            CrashPoint::MetaWrite => faults.fail_nth_write(2),
            CrashPoint::PayloadWrite => faults.fail_nth_write(3),
            CrashPoint::ShortPayloadWrite => faults.short_nth_write(3),
            CrashPoint::Flush => faults.set_fail_flush(true),
            CrashPoint::Preallocation => faults.set_fail_allocate(true),
        }
    }
}

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// The crash point tested.
    pub point: CrashPoint,
    /// Records appended before the crash.
    pub expected_records: u64,
    /// Records found after reopening.
    pub actual_records: u64,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    fn pass(point: CrashPoint, records: u64) -> Self {
        Self {
            passed: true,
            point,
            expected_records: records,
            actual_records: records,
            error: None,
        }
    }

    fn fail(point: CrashPoint, expected: u64, actual: u64, error: impl Into<String>) -> Self {
        Self {
            passed: false,
            point,
            expected_records: expected,
            actual_records: actual,
            error: Some(error.into()),
        }
    }
}

/// Test harness for crash recovery scenarios.
pub struct CrashHarness {
    dir: PathBuf,
    runs: usize,
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
    _temp_dir: Option<TempDir>,
}

impl CrashHarness {
    /// Creates a harness writing its logs into `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            runs: 0,
            results: Vec::new(),
            _temp_dir: None,
        }
    }

    /// Creates a harness in a temporary directory.
    pub fn with_temp_dir() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let mut harness = Self::new(temp_dir.path());
        harness._temp_dir = Some(temp_dir);
        Ok(harness)
    }

    /// Appends `committed` records, fails the next append at `point`,
    /// crashes and checks what recovery finds.
    pub fn run(&mut self, point: CrashPoint, committed: usize) -> CrashRecoveryResult {
        self.runs += 1;
        let path = self.dir.join(format!("crash-{}.binlog", self.runs));

        let result = match self.scenario(&path, point, committed) {
            Ok(result) => result,
            Err(e) => CrashRecoveryResult::fail(point, committed as u64, 0, e.to_string()),
        };
        self.results.push(result.clone());
        result
    }

    /// Runs every crash point with `committed` records.
    pub fn run_all(&mut self, committed: usize) -> Vec<CrashRecoveryResult> {
        CrashPoint::ALL
            .iter()
            .map(|&point| self.run(point, committed))
            .collect()
    }

    /// Returns true if every run so far passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    fn scenario(
        &self,
        path: &Path,
        point: CrashPoint,
        committed: usize,
    ) -> BinlogResult<CrashRecoveryResult> {
        let expected = committed as u64;
        let config = BinlogConfig::new(path)?.with_prealloc_step(TEST_PREALLOC_STEP);
        Binlog::open(config.clone())?.close()?;

        let backend = FileBackend::open(path, false)?;
        let (backend, faults) = FaultyBackend::new(Box::new(backend));
        let mut log = Binlog::open_with_backend(config.clone(), Box::new(backend))?;

        for record in sample_records(committed) {
            log.append(&record)?;
        }
        let end = log.append_position();

        // Larger than one step, so it always needs preallocation
        let victim = RecordView::put(test_key(u64::MAX), vec![0xAB; 2 * TEST_PREALLOC_STEP as usize])
            .with_meta(&b"victim"[..]);
        point.arm(&faults);

        if log.append(&victim).is_ok() {
            return Ok(CrashRecoveryResult::fail(
                point,
                expected,
                log.record_count(),
                "append succeeded despite injected fault",
            ));
        }
        if log.append_position() != end {
            return Ok(CrashRecoveryResult::fail(
                point,
                expected,
                log.record_count(),
                format!("append position moved from {end} to {}", log.append_position()),
            ));
        }
        let replayed = log.apply(|_, _| Ok(()))?;
        if replayed != expected {
            return Ok(CrashRecoveryResult::fail(
                point,
                expected,
                replayed,
                "replay saw the failed record",
            ));
        }

        faults.reset();
        drop(log);

        let reopened = Binlog::open(config)?;
        let recovered = reopened.recovered_records();
        let position = reopened.append_position();
        let replayed = reopened.apply(|_, _| Ok(()))?;
        reopened.close()?;

        if recovered != expected || replayed != expected {
            return Ok(CrashRecoveryResult::fail(
                point,
                expected,
                recovered,
                "recovery saw the failed record",
            ));
        }
        if position != end {
            return Ok(CrashRecoveryResult::fail(
                point,
                expected,
                recovered,
                format!("recovered position {position}, expected {end}"),
            ));
        }

        Ok(CrashRecoveryResult::pass(point, expected))
    }
}
