//! Error types for the binlog.

use binlog_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for binlog operations.
pub type BinlogResult<T> = Result<T, BinlogError>;

/// Coarse classification of a [`BinlogError`].
///
/// Callers that only need to decide between "fix the input", "the file is
/// not a binlog", "retry later" and so on can match on this instead of on
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad path, bad offset or other invalid input.
    InvalidArgument,
    /// Bad magic, unsupported version, disallowed flags or a malformed record.
    Format,
    /// Short read, short write or an underlying I/O failure.
    Io,
    /// Space or memory could not be obtained.
    ResourceExhausted,
    /// Another owner holds the log's exclusive lock.
    Concurrency,
    /// The caller's applier rejected a record during replay.
    Applier,
}

/// Errors that can occur in binlog operations.
#[derive(Debug, Error)]
pub enum BinlogError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Why the argument was rejected.
        message: String,
    },

    /// The log header or a record header is malformed.
    #[error("invalid binlog format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The log was written by an unsupported format version.
    #[error("unsupported binlog version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found on disk.
        found: u16,
        /// The only version this build reads and writes.
        supported: u16,
    },

    /// Space or memory could not be obtained.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        /// Description of the exhausted resource.
        message: String,
    },

    /// Another process (or handle) holds the log.
    #[error("binlog locked: {} is held by another owner", path.display())]
    Locked {
        /// Path of the locked log.
        path: PathBuf,
    },

    /// The applier callback failed while replaying the record at `lsn`.
    #[error("applier failed at lsn {lsn}: {message}")]
    Applier {
        /// LSN of the record being applied.
        lsn: u64,
        /// Description of the failure.
        message: String,
    },
}

impl BinlogError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a resource exhausted error.
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Creates an applier error for the record at `lsn`.
    pub fn applier(lsn: u64, message: impl Into<String>) -> Self {
        Self::Applier {
            lsn,
            message: message.into(),
        }
    }

    /// Returns the error's classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(StorageError::Allocation { .. }) | Self::ResourceExhausted { .. } => {
                ErrorKind::ResourceExhausted
            }
            Self::Storage(StorageError::Locked) | Self::Locked { .. } => ErrorKind::Concurrency,
            Self::Storage(_) => ErrorKind::Io,
            Self::Io(e) if e.kind() == io::ErrorKind::OutOfMemory => ErrorKind::ResourceExhausted,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::InvalidFormat { .. } | Self::UnsupportedVersion { .. } => ErrorKind::Format,
            Self::Applier { .. } => ErrorKind::Applier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            BinlogError::invalid_argument("empty path").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            BinlogError::invalid_format("bad magic").kind(),
            ErrorKind::Format
        );
        assert_eq!(
            BinlogError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
            .kind(),
            ErrorKind::Format
        );
        assert_eq!(
            BinlogError::from(StorageError::ShortWrite {
                offset: 0,
                expected: 4,
                written: 2
            })
            .kind(),
            ErrorKind::Io
        );
        assert_eq!(
            BinlogError::from(StorageError::Allocation {
                len: 1,
                source: io::Error::new(io::ErrorKind::Other, "no space"),
            })
            .kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            BinlogError::Locked {
                path: PathBuf::from("binlog")
            }
            .kind(),
            ErrorKind::Concurrency
        );
        assert_eq!(BinlogError::applier(64, "rejected").kind(), ErrorKind::Applier);
    }

    #[test]
    fn messages_name_the_problem() {
        let err = BinlogError::UnsupportedVersion {
            found: 7,
            supported: 1,
        };
        assert_eq!(err.to_string(), "unsupported binlog version 7 (supported: 1)");

        let err = BinlogError::applier(160, "blob store full");
        assert_eq!(err.to_string(), "applier failed at lsn 160: blob store full");
    }
}
