//! Binlog configuration.

use crate::error::{BinlogError, BinlogResult};
use std::path::{Path, PathBuf};

/// Longest accepted log path, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Default preallocation step (16 MiB).
pub const DEFAULT_PREALLOC_STEP: u64 = 16 * 1024 * 1024;

bitflags::bitflags! {
    /// Behaviour flags of a binlog.
    ///
    /// The flags a log is opened with are recorded in its disk header, except
    /// [`BinlogFlags::TRUNCATE`], which only affects the open it is set for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BinlogFlags: u64 {
        /// Grow the file in fixed steps ahead of appends.
        const PREALLOC = 1 << 0;
        /// Open the file with forced-synchronous writes instead of flushing
        /// after every append.
        const SYNC = 1 << 1;
        /// Discard every record when the log is opened.
        const TRUNCATE = 1 << 2;
    }
}

impl BinlogFlags {
    /// Flags used by [`BinlogConfig::new`].
    pub const DEFAULTS: Self = Self::PREALLOC;

    /// Returns the subset of flags recorded in the disk header.
    #[must_use]
    pub fn persistent(self) -> Self {
        self.difference(Self::TRUNCATE)
    }
}

impl Default for BinlogFlags {
    fn default() -> Self {
        Self::DEFAULTS
    }
}

/// A configured, not yet opened binlog.
///
/// This is the handle for the CONFIGURED and CLOSED states: it is produced by
/// [`BinlogConfig::new`], consumed by [`Binlog::open`](crate::Binlog::open)
/// and handed back by [`Binlog::close`](crate::Binlog::close). Dropping it
/// releases everything it owns.
///
/// # Example
///
/// ```rust
/// use binlog_core::BinlogConfig;
///
/// let config = BinlogConfig::new("/var/lib/blob/data.binlog")
///     .unwrap()
///     .with_prealloc_step(4 * 1024 * 1024)
///     .with_sync(true);
/// assert!(config.is_synchronous());
/// ```
#[derive(Debug, Clone)]
pub struct BinlogConfig {
    path: PathBuf,
    flags: BinlogFlags,
    prealloc_step: u64,
}

impl BinlogConfig {
    /// Creates a configuration for the log at `path` with default flags.
    ///
    /// # Errors
    ///
    /// Returns [`BinlogError::InvalidArgument`] if the path is empty or
    /// longer than [`MAX_PATH_LEN`] bytes.
    pub fn new(path: impl AsRef<Path>) -> BinlogResult<Self> {
        let path = path.as_ref();
        let len = path.as_os_str().len();

        if len == 0 {
            return Err(BinlogError::invalid_argument("binlog path is empty"));
        }
        if len > MAX_PATH_LEN {
            return Err(BinlogError::invalid_argument(format!(
                "binlog path length {len} exceeds maximum of {MAX_PATH_LEN}"
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            flags: BinlogFlags::DEFAULTS,
            prealloc_step: DEFAULT_PREALLOC_STEP,
        })
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured flags.
    #[must_use]
    pub fn flags(&self) -> BinlogFlags {
        self.flags
    }

    /// Returns the preallocation step in bytes.
    #[must_use]
    pub fn prealloc_step(&self) -> u64 {
        self.prealloc_step
    }

    /// Returns true if preallocation is enabled.
    #[must_use]
    pub fn is_preallocating(&self) -> bool {
        self.flags.contains(BinlogFlags::PREALLOC)
    }

    /// Returns true if the log is opened with forced-synchronous writes.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.flags.contains(BinlogFlags::SYNC)
    }

    /// Returns true if opening discards existing records.
    #[must_use]
    pub fn truncates_on_open(&self) -> bool {
        self.flags.contains(BinlogFlags::TRUNCATE)
    }

    /// Replaces all flags.
    #[must_use]
    pub fn with_flags(mut self, flags: BinlogFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Enables or disables preallocation.
    #[must_use]
    pub fn with_preallocation(mut self, value: bool) -> Self {
        self.flags.set(BinlogFlags::PREALLOC, value);
        self
    }

    /// Enables or disables forced-synchronous writes.
    #[must_use]
    pub fn with_sync(mut self, value: bool) -> Self {
        self.flags.set(BinlogFlags::SYNC, value);
        self
    }

    /// Sets whether the next open discards existing records.
    #[must_use]
    pub fn with_truncate(mut self, value: bool) -> Self {
        self.flags.set(BinlogFlags::TRUNCATE, value);
        self
    }

    /// Sets the preallocation step in bytes.
    #[must_use]
    pub fn with_prealloc_step(mut self, step: u64) -> Self {
        self.prealloc_step = step;
        self
    }

    /// Checks settings that can only be judged as a whole.
    pub(crate) fn validate(&self) -> BinlogResult<()> {
        if self.is_preallocating() && self.prealloc_step == 0 {
            return Err(BinlogError::invalid_argument(
                "preallocation step must be greater than zero",
            ));
        }
        Ok(())
    }
}
