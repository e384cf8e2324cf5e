//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up test logs
//! and common test data.

use binlog_core::{Binlog, BinlogConfig, BlobKey, RecordType, RecordView};
use binlog_storage::InMemoryBackend;
use std::path::PathBuf;
use tempfile::TempDir;

/// Preallocation step used by fixtures, small enough to exercise growth.
pub const TEST_PREALLOC_STEP: u64 = 4096;

/// A test log with automatic cleanup.
///
/// Dereferences to the open [`Binlog`].
pub struct TestLog {
    log: Option<Binlog>,
    config: BinlogConfig,
    _temp_dir: Option<TempDir>,
}

impl TestLog {
    /// Creates a log over an in-memory backend.
    pub fn memory() -> Self {
        let config = BinlogConfig::new("memory.binlog")
            .expect("valid path")
            .with_prealloc_step(TEST_PREALLOC_STEP);
        let mut backend = InMemoryBackend::new();
        Binlog::initialize(&config, &mut backend).expect("Failed to initialize log");
        let log = Binlog::open_with_backend(config.clone(), Box::new(backend))
            .expect("Failed to open in-memory log");

        Self {
            log: Some(log),
            config,
            _temp_dir: None,
        }
    }

    /// Creates a log in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with(|config| config)
    }

    /// Creates a file-based log, letting `configure` adjust the config.
    pub fn file_with(configure: impl FnOnce(BinlogConfig) -> BinlogConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(
            BinlogConfig::new(temp_dir.path().join("test.binlog"))
                .expect("valid path")
                .with_prealloc_step(TEST_PREALLOC_STEP),
        );
        let log = Binlog::open(config.clone()).expect("Failed to open file log");

        Self {
            log: Some(log),
            config,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the log path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|_| self.config.path().to_path_buf())
    }

    /// Closes and reopens a file-based log, running recovery again.
    ///
    /// # Panics
    ///
    /// Panics for in-memory logs, whose storage does not outlive the handle.
    pub fn reopen(&mut self) {
        assert!(self._temp_dir.is_some(), "in-memory logs cannot be reopened");
        let log = self.log.take().expect("log is open");
        let config = log.close().expect("Failed to close log");
        self.log = Some(Binlog::open(config).expect("Failed to reopen log"));
    }

    /// Drops the handle without closing it, then opens the log again.
    pub fn crash_and_reopen(&mut self) {
        assert!(self._temp_dir.is_some(), "in-memory logs cannot be reopened");
        drop(self.log.take());
        let config = self.config.clone().with_truncate(false);
        self.log = Some(Binlog::open(config).expect("Failed to reopen log"));
    }
}

impl std::ops::Deref for TestLog {
    type Target = Binlog;

    fn deref(&self) -> &Self::Target {
        self.log.as_ref().expect("log is open")
    }
}

impl std::ops::DerefMut for TestLog {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.log.as_mut().expect("log is open")
    }
}

impl Drop for TestLog {
    fn drop(&mut self) {
        if let Some(log) = self.log.take() {
            let _ = log.close();
        }
    }
}

/// Runs a test with a temporary in-memory log.
///
/// # Example
///
/// ```rust
/// use binlog_testkit::with_temp_log;
///
/// with_temp_log(|log| {
///     assert!(log.is_empty());
/// });
/// ```
pub fn with_temp_log<F, R>(f: F) -> R
where
    F: FnOnce(&mut Binlog) -> R,
{
    let mut log = TestLog::memory();
    f(&mut log)
}

/// Runs a test with a temporary file-based log.
pub fn with_temp_file_log<F, R>(f: F) -> R
where
    F: FnOnce(&mut Binlog) -> R,
{
    let mut log = TestLog::file();
    f(&mut log)
}

/// Returns a key whose first eight bytes are `n` in big-endian order.
pub fn test_key(n: u64) -> BlobKey {
    BlobKey::from_slice(&n.to_be_bytes()).expect("eight bytes fit in a key")
}

/// Returns `count` records alternating between puts with metadata and
/// removes.
pub fn sample_records(count: usize) -> Vec<RecordView> {
    (0..count)
        .map(|i| {
            let key = test_key(i as u64);
            if i % 4 == 3 {
                RecordView::new(RecordType::Remove, key)
            } else {
                RecordView::put(key, format!("payload-{i}").into_bytes())
                    .with_meta(format!("meta-{i}").into_bytes())
            }
        })
        .collect()
}

/// Appends `records` and returns their LSNs.
pub fn append_all(log: &mut Binlog, records: &[RecordView]) -> Vec<u64> {
    records
        .iter()
        .map(|record| log.append(record).expect("Failed to append record"))
        .collect()
}

/// Collects every record of `log` by replaying it.
pub fn replay_all(log: &Binlog) -> Vec<(u64, RecordView)> {
    let mut records = Vec::new();
    log.apply(|lsn, record| {
        records.push((lsn, record.clone()));
        Ok(())
    })
    .expect("Failed to replay log");
    records
}
