//! Storage backend trait definition.

use crate::error::StorageResult;

/// Page-cache usage hint passed to [`StorageBackend::advise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAdvice {
    /// The whole file will be read soon.
    WillNeed,
    /// The file's cached pages are no longer needed.
    DontNeed,
}

/// A low-level storage backend for the binlog.
///
/// Storage backends are **opaque byte stores** addressed by absolute offset.
/// The binlog owns all format interpretation.
///
/// # Invariants
///
/// - `write_at` either transfers every byte or returns an error
/// - `read_at` returns exactly `len` bytes or an error
/// - `flush` makes previously written data durable, `sync` additionally
///   makes file metadata durable
/// - `allocate` never shrinks the storage
pub trait StorageBackend: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if fewer than `len` bytes are available, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` at `offset` with a single positioned write.
    ///
    /// A partial transfer is reported as
    /// [`StorageError::ShortWrite`](crate::StorageError::ShortWrite).
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Flushes written data to durable storage.
    ///
    /// After this returns successfully, all previously written data is
    /// guaranteed to survive process termination. File metadata that is not
    /// needed to read the data back may still be pending.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or the
    /// truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Ensures at least `len` bytes are allocated and the storage is at least
    /// `len` bytes long. Newly allocated bytes read back as zeros.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`](crate::StorageError::Allocation)
    /// if the space cannot be reserved.
    fn allocate(&mut self, len: u64) -> StorageResult<()>;

    /// Tries to take the exclusive advisory lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`](crate::StorageError::Locked) if
    /// another owner holds the lock.
    fn try_lock_exclusive(&self) -> StorageResult<()>;

    /// Releases the exclusive advisory lock.
    fn unlock(&self) -> StorageResult<()>;

    /// Gives the OS a page-cache usage hint.
    ///
    /// Hints are advisory: callers are expected to log and ignore failures.
    fn advise(&self, advice: CacheAdvice) -> StorageResult<()> {
        let _ = advice;
        Ok(())
    }
}
