//! The open binlog.
//!
//! A [`Binlog`] only exists between a successful [`Binlog::open`] and
//! [`Binlog::close`]. It holds the file, its exclusive lock, the in-memory
//! disk header and the append position for the whole of that time.
//!
//! Appends live in the `writer` module, reads in `reader` and replay in
//! `replay`; this module owns the lifecycle.

mod reader;
mod replay;
mod scan;
mod writer;

pub use replay::BinlogIter;
pub use scan::TailState;

use crate::config::BinlogConfig;
use crate::error::{BinlogError, BinlogResult};
use crate::format::{DiskHeader, HEADER_SIZE};
use crate::space::SpaceManager;
use binlog_storage::{CacheAdvice, FileBackend, StorageBackend, StorageError};
use std::path::Path;
use tracing::{error, info, warn};

/// An open, exclusively locked binlog.
///
/// # Example
///
/// ```rust
/// use binlog_core::{Binlog, BinlogConfig, BlobKey, RecordView};
///
/// let dir = tempfile::tempdir().unwrap();
/// let config = BinlogConfig::new(dir.path().join("data.binlog")).unwrap();
///
/// let mut log = Binlog::open(config).unwrap();
/// let lsn = log.append(&RecordView::put(BlobKey::default(), &b"hello"[..])).unwrap();
/// assert_eq!(lsn, 64);
///
/// let record = log.read_at(lsn).unwrap();
/// assert_eq!(record.payload().as_ref(), b"hello");
///
/// let config = log.close().unwrap();
/// let log = Binlog::open(config).unwrap();
/// assert_eq!(log.append_position(), 64 + 96 + 5);
/// ```
pub struct Binlog {
    config: BinlogConfig,
    backend: Box<dyn StorageBackend>,
    header: DiskHeader,
    space: SpaceManager,
    append_position: u64,
    tail: TailState,
    recovered: u64,
    records: u64,
    read_only: bool,
    closed: bool,
}

impl Binlog {
    /// Opens the log described by `config`, creating it if needed.
    ///
    /// A missing file is created exclusively (mode 0644), preallocated by one
    /// step when preallocation is on, and given a fresh header. The file is
    /// then reopened read/write (synchronously with
    /// [`BinlogFlags::SYNC`](crate::BinlogFlags::SYNC)) and handed to
    /// [`Binlog::open_with_backend`].
    ///
    /// # Errors
    ///
    /// - [`BinlogError::InvalidArgument`] for a zero preallocation step
    /// - [`BinlogError::Locked`] if another owner has the log open
    /// - a format error if the header does not validate
    /// - an I/O or resource error from any file operation
    pub fn open(config: BinlogConfig) -> BinlogResult<Self> {
        config.validate()?;
        Self::create_if_missing(&config)?;

        let backend = FileBackend::open(config.path(), config.is_synchronous()).map_err(|e| {
            error!(path = %config.path().display(), error = %e, "failed to open binlog");
            e
        })?;

        Self::open_with_backend(config, Box::new(backend))
    }

    /// Opens an existing log for reading only.
    ///
    /// The lock is taken and the recovery scan runs as for [`Binlog::open`],
    /// but nothing is created or truncated, [`Binlog::append`] is refused and
    /// [`Binlog::close`] leaves the file untouched.
    ///
    /// # Errors
    ///
    /// As for [`Binlog::open`]; a missing file is an I/O error.
    pub fn open_read_only(config: BinlogConfig) -> BinlogResult<Self> {
        let config = config.with_truncate(false);
        config.validate()?;

        let backend = FileBackend::open(config.path(), false).map_err(|e| {
            error!(path = %config.path().display(), error = %e, "failed to open binlog");
            e
        })?;

        Self::attach(config, Box::new(backend), true)
    }

    /// Opens a log over an already opened backend.
    ///
    /// Takes the exclusive lock, applies [`BinlogFlags::TRUNCATE`], reads the
    /// header and runs the recovery scan. The lock is released again on any
    /// failure after it was taken. The backend must already hold a header;
    /// see [`Binlog::initialize`].
    ///
    /// [`BinlogFlags::TRUNCATE`]: crate::BinlogFlags::TRUNCATE
    pub fn open_with_backend(
        config: BinlogConfig,
        backend: Box<dyn StorageBackend>,
    ) -> BinlogResult<Self> {
        Self::attach(config, backend, false)
    }

    fn attach(
        config: BinlogConfig,
        mut backend: Box<dyn StorageBackend>,
        read_only: bool,
    ) -> BinlogResult<Self> {
        config.validate()?;

        backend.try_lock_exclusive().map_err(|e| match e {
            StorageError::Locked => {
                warn!(path = %config.path().display(), "binlog is locked by another owner");
                BinlogError::Locked {
                    path: config.path().to_path_buf(),
                }
            }
            other => {
                error!(path = %config.path().display(), error = %other, "failed to lock binlog");
                other.into()
            }
        })?;

        match Self::load(&config, backend.as_mut()) {
            Ok(loaded) => Ok(Self::from_loaded(config, backend, loaded, read_only)),
            Err(e) => {
                error!(path = %config.path().display(), error = %e, "failed to open binlog");
                if let Err(unlock) = backend.unlock() {
                    warn!(error = %unlock, "failed to release binlog lock");
                }
                Err(e)
            }
        }
    }

    /// Writes a fresh log into an empty backend: one preallocation step when
    /// enabled, then a validated header.
    pub fn initialize(config: &BinlogConfig, backend: &mut dyn StorageBackend) -> BinlogResult<()> {
        config.validate()?;

        if config.is_preallocating() {
            backend.allocate(config.prealloc_step())?;
        }
        DiskHeader::new(config.flags().persistent()).write(backend)
    }

    fn create_if_missing(config: &BinlogConfig) -> BinlogResult<()> {
        let path = config.path();
        let mut backend = match FileBackend::create_new(path) {
            Ok(backend) => backend,
            Err(e) if e.is_already_exists() => return Ok(()),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to create binlog");
                return Err(e.into());
            }
        };

        if let Err(e) = Self::initialize(config, &mut backend) {
            error!(path = %path.display(), error = %e, "failed to initialize binlog");
            drop(backend);
            // A headerless file would make every later open fail
            match std::fs::remove_file(path) {
                Ok(()) => warn!(path = %path.display(), "removed partially created binlog"),
                Err(remove) => warn!(
                    path = %path.display(),
                    error = %remove,
                    "failed to remove partially created binlog"
                ),
            }
            return Err(e);
        }
        info!(path = %path.display(), "created binlog");
        Ok(())
    }

    fn load(config: &BinlogConfig, backend: &mut dyn StorageBackend) -> BinlogResult<Loaded> {
        if config.truncates_on_open() && backend.size()? > HEADER_SIZE as u64 {
            backend.truncate(HEADER_SIZE as u64)?;
            info!(path = %config.path().display(), "truncated binlog");
        }

        if let Err(e) = backend.advise(CacheAdvice::WillNeed) {
            warn!(path = %config.path().display(), error = %e, "page-cache hint failed");
        }

        let file_size = backend.size()?;
        let mut header = DiskHeader::read(backend)?;
        header.set_flags(config.flags().persistent());

        let outcome = scan::scan(backend, file_size);
        if !outcome.tail.is_clean() {
            warn!(
                path = %config.path().display(),
                tail = %outcome.tail,
                "binlog ends in a damaged frame, ignoring it"
            );
        }

        Ok(Loaded {
            header,
            file_size,
            outcome,
        })
    }

    fn from_loaded(
        config: BinlogConfig,
        backend: Box<dyn StorageBackend>,
        loaded: Loaded,
        read_only: bool,
    ) -> Self {
        // Truncation has been applied; it must not repeat on the next open
        let config = config.with_truncate(false);
        let Loaded {
            header,
            file_size,
            outcome,
        } = loaded;

        info!(
            path = %config.path().display(),
            next_lsn = outcome.end,
            records = outcome.records,
            read_only,
            "opened binlog"
        );

        Self {
            space: SpaceManager::new(
                config.is_preallocating(),
                config.prealloc_step(),
                file_size.max(outcome.end),
            ),
            config,
            backend,
            header,
            append_position: outcome.end,
            tail: outcome.tail,
            recovered: outcome.records,
            records: outcome.records,
            read_only,
            closed: false,
        }
    }

    /// Closes the log and hands back its configuration.
    ///
    /// Rewrites the header, makes everything durable, releases the lock,
    /// drops the file's cached pages and closes the file. A failing step is
    /// logged and returned; the lock is still released. A read-only log skips
    /// the header rewrite and the sync.
    ///
    /// The returned configuration never carries
    /// [`BinlogFlags::TRUNCATE`](crate::BinlogFlags::TRUNCATE), so reopening
    /// with it keeps the records.
    pub fn close(mut self) -> BinlogResult<BinlogConfig> {
        if let Err(e) = self.shutdown() {
            error!(path = %self.path().display(), error = %e, "failed to close binlog");
            self.release_lock();
            return Err(e);
        }

        info!(
            path = %self.path().display(),
            end = self.append_position,
            records = self.records,
            "closed binlog"
        );
        Ok(self.config.clone())
    }

    fn shutdown(&mut self) -> BinlogResult<()> {
        if !self.read_only {
            self.header.set_flags(self.config.flags().persistent());
            self.header.write(self.backend.as_mut())?;
            self.backend.sync()?;
        }

        self.backend.unlock()?;
        self.closed = true;

        if let Err(e) = self.backend.advise(CacheAdvice::DontNeed) {
            warn!(path = %self.path().display(), error = %e, "page-cache hint failed");
        }
        Ok(())
    }

    fn release_lock(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.backend.unlock() {
            warn!(path = %self.path().display(), error = %e, "failed to release binlog lock");
        }
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.config.path()
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &BinlogConfig {
        &self.config
    }

    /// Returns the in-memory disk header.
    #[must_use]
    pub fn header(&self) -> &DiskHeader {
        &self.header
    }

    /// Returns the LSN the next record will be written at.
    #[must_use]
    pub fn append_position(&self) -> u64 {
        self.append_position
    }

    /// Returns how far the file has been preallocated (or written).
    #[must_use]
    pub fn preallocated_size(&self) -> u64 {
        self.space.size()
    }

    /// Returns why the recovery scan at open stopped.
    #[must_use]
    pub fn tail_state(&self) -> &TailState {
        &self.tail
    }

    /// Returns the number of records found by the recovery scan.
    #[must_use]
    pub fn recovered_records(&self) -> u64 {
        self.recovered
    }

    /// Returns the number of records in the log.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Returns true if the log was opened with [`Binlog::open_read_only`].
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true if the log holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.append_position == HEADER_SIZE as u64
    }
}

impl std::fmt::Debug for Binlog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binlog")
            .field("config", &self.config)
            .field("header", &self.header)
            .field("append_position", &self.append_position)
            .field("preallocated_size", &self.space.size())
            .field("tail", &self.tail)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl Drop for Binlog {
    fn drop(&mut self) {
        if !self.closed {
            warn!(path = %self.path().display(), "binlog dropped without close");
            self.release_lock();
        }
    }
}

struct Loaded {
    header: DiskHeader,
    file_size: u64,
    outcome: scan::ScanOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BinlogFlags;
    use crate::error::ErrorKind;
    use crate::format::{BlobKey, RecordType, RECORD_HEADER_SIZE};
    use crate::view::RecordView;
    use binlog_storage::{FaultyBackend, InMemoryBackend};
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> BinlogConfig {
        BinlogConfig::new(dir.join("test.binlog"))
            .unwrap()
            .with_prealloc_step(4096)
    }

    #[test]
    fn open_creates_file_with_header() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let path = config.path().to_path_buf();

        let log = Binlog::open(config).unwrap();
        assert!(path.exists());
        assert_eq!(log.append_position(), HEADER_SIZE as u64);
        assert_eq!(log.preallocated_size(), 4096);
        assert!(log.is_empty());
        assert!(log.tail_state().is_clean());
        assert_eq!(log.header().flags(), BinlogFlags::PREALLOC);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);

        log.close().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn created_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let path = config.path().to_path_buf();
        Binlog::open(config).unwrap().close().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o022, 0);
        assert_eq!(mode & 0o600, 0o600);
    }

    #[test]
    fn open_without_prealloc_has_header_only() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_preallocation(false);
        let path = config.path().to_path_buf();

        let log = Binlog::open(config).unwrap();
        assert_eq!(log.preallocated_size(), HEADER_SIZE as u64);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE as u64);
        log.close().unwrap();
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let first = Binlog::open(config.clone()).unwrap();
        let err = Binlog::open(config.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        assert!(matches!(err, BinlogError::Locked { .. }));

        first.close().unwrap();
        Binlog::open(config).unwrap().close().unwrap();
    }

    #[test]
    fn drop_without_close_releases_lock() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        drop(Binlog::open(config.clone()).unwrap());
        Binlog::open(config).unwrap().close().unwrap();
    }

    #[test]
    fn zero_step_rejected_at_open() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_prealloc_step(0);

        let err = Binlog::open(config.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!config.path().exists());
    }

    #[test]
    fn not_a_binlog() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(config.path(), vec![0x42; 200]).unwrap();

        let err = Binlog::open(config.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        // The failed open must not leave the file locked
        let err = Binlog::open(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn short_file_is_io_error() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(config.path(), b"EBLOB").unwrap();

        let err = Binlog::open(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn unsupported_version() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let header = DiskHeader {
            version: 2,
            ..DiskHeader::default()
        };
        std::fs::write(config.path(), header.encode()).unwrap();

        let err = Binlog::open(config).unwrap_err();
        assert!(matches!(
            err,
            BinlogError::UnsupportedVersion { found: 2, .. }
        ));
    }

    #[test]
    fn reopen_recovers_position() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let mut log = Binlog::open(config).unwrap();
        log.append(&RecordView::put(BlobKey::default(), &b"one"[..]))
            .unwrap();
        log.append(&RecordView::remove(BlobKey::default())).unwrap();
        let end = log.append_position();
        let config = log.close().unwrap();

        let log = Binlog::open(config).unwrap();
        assert_eq!(log.append_position(), end);
        assert_eq!(log.recovered_records(), 2);
        assert_eq!(log.record_count(), 2);
        assert!(log.tail_state().is_clean());
        log.close().unwrap();
    }

    #[test]
    fn truncate_on_open_discards_records() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let mut log = Binlog::open(config).unwrap();
        for _ in 0..5 {
            log.append(&RecordView::put(BlobKey::default(), vec![1u8; 100]))
                .unwrap();
        }
        let config = log.close().unwrap();

        let log = Binlog::open(config.with_truncate(true)).unwrap();
        assert_eq!(log.append_position(), HEADER_SIZE as u64);
        assert_eq!(log.recovered_records(), 0);
        assert_eq!(log.apply(|_, _| Ok(())).unwrap(), 0);
        assert!(!log.header().flags().contains(BinlogFlags::TRUNCATE));
        let path = log.path().to_path_buf();
        log.close().unwrap();

        assert_eq!(std::fs::metadata(path).unwrap().len(), HEADER_SIZE as u64);
    }

    #[test]
    fn truncate_applies_to_one_open_only() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_truncate(true);

        let mut log = Binlog::open(config).unwrap();
        assert!(!log.config().truncates_on_open());
        log.append(&RecordView::put(BlobKey::default(), &b"kept"[..]))
            .unwrap();
        let config = log.close().unwrap();
        assert!(!config.truncates_on_open());

        let log = Binlog::open(config).unwrap();
        assert_eq!(log.recovered_records(), 1);
        assert_eq!(
            log.read_at(HEADER_SIZE as u64).unwrap().payload().as_ref(),
            b"kept"
        );
        log.close().unwrap();
    }

    #[test]
    fn failed_creation_leaves_no_file() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_prealloc_step(1 << 62);

        let err = Binlog::open(config.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(!config.path().exists());

        let log = Binlog::open(config.with_prealloc_step(4096)).unwrap();
        assert!(log.is_empty());
        log.close().unwrap();
    }

    #[test]
    fn read_only_open_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_preallocation(false);

        let mut log = Binlog::open(config.clone()).unwrap();
        log.append(&RecordView::put(BlobKey::default(), &b"one"[..]))
            .unwrap();
        log.close().unwrap();

        // SYNC differs from the persisted flags, so a header rewrite would show
        let before = std::fs::read(config.path()).unwrap();
        let mut log = Binlog::open_read_only(config.clone().with_sync(true).with_truncate(true))
            .unwrap();
        assert!(log.is_read_only());
        assert_eq!(log.recovered_records(), 1);
        assert_eq!(log.iter().count(), 1);

        let err = log
            .append(&RecordView::remove(BlobKey::default()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        log.close().unwrap();

        assert_eq!(std::fs::read(config.path()).unwrap(), before);
        Binlog::open(config).unwrap().close().unwrap();
    }

    #[test]
    fn read_only_open_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let err = Binlog::open_read_only(config.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!config.path().exists());
    }

    #[test]
    fn close_persists_open_flags() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        Binlog::open(config.clone()).unwrap().close().unwrap();

        let config = config.with_sync(true).with_truncate(true);
        let log = Binlog::open(config.clone()).unwrap();
        log.close().unwrap();

        let backend = FileBackend::open(config.path(), false).unwrap();
        let header = DiskHeader::read(&backend).unwrap();
        assert_eq!(header.flags(), BinlogFlags::PREALLOC | BinlogFlags::SYNC);
    }

    #[test]
    fn close_returns_reusable_config() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_sync(true);

        let log = Binlog::open(config).unwrap();
        let config = log.close().unwrap();
        assert!(config.is_synchronous());
        assert_eq!(config.prealloc_step(), 4096);

        Binlog::open(config).unwrap().close().unwrap();
    }

    #[test]
    fn failed_close_still_unlocks() {
        let config = BinlogConfig::new("mem.binlog").unwrap();
        let mut memory = InMemoryBackend::new();
        Binlog::initialize(&config, &mut memory).unwrap();
        let (backend, faults) = FaultyBackend::new(Box::new(memory));

        let log = Binlog::open_with_backend(config, Box::new(backend)).unwrap();
        faults.set_fail_flush(true);
        let err = log.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn failed_page_cache_hint_is_ignored() {
        let config = BinlogConfig::new("mem.binlog").unwrap();
        let mut memory = InMemoryBackend::new();
        Binlog::initialize(&config, &mut memory).unwrap();
        let (backend, faults) = FaultyBackend::new(Box::new(memory));
        faults.set_fail_advise(true);

        let log = Binlog::open_with_backend(config, Box::new(backend)).unwrap();
        log.close().unwrap();
    }

    #[test]
    fn in_memory_lifecycle() {
        let config = BinlogConfig::new("mem.binlog")
            .unwrap()
            .with_prealloc_step(1024);
        let mut backend = InMemoryBackend::new();
        Binlog::initialize(&config, &mut backend).unwrap();

        let mut log = Binlog::open_with_backend(config, Box::new(backend)).unwrap();
        assert_eq!(log.preallocated_size(), 1024);

        let lsn = log
            .append(&RecordView::new(RecordType::Remove, BlobKey::default()))
            .unwrap();
        assert_eq!(lsn, HEADER_SIZE as u64);
        assert_eq!(
            log.append_position(),
            (HEADER_SIZE + RECORD_HEADER_SIZE) as u64
        );
        log.close().unwrap();
    }

    #[test]
    fn damaged_tail_is_tolerated() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).with_preallocation(false);

        let mut log = Binlog::open(config).unwrap();
        log.append(&RecordView::put(BlobKey::default(), &b"ok"[..]))
            .unwrap();
        let end = log.append_position();
        let config = log.close().unwrap();

        // A record header whose body never made it to disk
        let torn = RecordView::put(BlobKey::default(), vec![9u8; 500]).header();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(config.path())
            .unwrap();
        std::io::Write::write_all(&mut file, &torn.encode()).unwrap();
        drop(file);

        let mut log = Binlog::open(config).unwrap();
        assert_eq!(log.append_position(), end);
        assert_eq!(log.tail_state(), &TailState::Truncated { offset: end });

        // The next append overwrites the torn frame
        let lsn = log
            .append(&RecordView::put(BlobKey::default(), &b"next"[..]))
            .unwrap();
        assert_eq!(lsn, end);
        let config = log.close().unwrap();

        let log = Binlog::open(config).unwrap();
        assert_eq!(log.recovered_records(), 2);
        assert!(log.tail_state().is_clean());
        log.close().unwrap();
    }
}
