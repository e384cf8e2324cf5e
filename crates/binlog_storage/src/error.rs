//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A write transferred fewer bytes than requested.
    #[error("short write at offset {offset}: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Offset of the write.
        offset: u64,
        /// Number of bytes that should have been written.
        expected: usize,
        /// Number of bytes actually written.
        written: usize,
    },

    /// Space could not be allocated for the file.
    #[error("failed to allocate {len} bytes: {source}")]
    Allocation {
        /// The requested file size.
        len: u64,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Another holder owns the exclusive lock.
    #[error("storage is locked by another owner")]
    Locked,
}

impl StorageError {
    /// Returns true if this error reports that a file already exists.
    ///
    /// Exclusive creation uses this to tell "someone created it first" from
    /// real failures.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::AlreadyExists)
    }
}
