//! Recovery scan.
//!
//! Walks the record headers from [`HEADER_SIZE`] and finds where the log
//! ends. The scan is tolerant: whatever stops it, everything before that
//! point is the log and the append position is set there. [`TailState`]
//! records why it stopped so callers can tell a clean end from damage.

use crate::format::{RecordHeader, HEADER_SIZE, RECORD_HEADER_SIZE};
use binlog_storage::StorageBackend;
use std::fmt;
use tracing::debug;

/// Why the recovery scan stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailState {
    /// End of file, or unused (all-zero) space.
    Clean,
    /// A frame starts at `offset` but the file ends before it does.
    Truncated {
        /// Offset of the incomplete frame.
        offset: u64,
    },
    /// The record header at `offset` is not valid, or could not be read.
    Corrupt {
        /// Offset of the bad record header.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },
}

impl TailState {
    /// Returns true for [`TailState::Clean`].
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns the offset of the damaged frame, if any.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Clean => None,
            Self::Truncated { offset } | Self::Corrupt { offset, .. } => Some(*offset),
        }
    }
}

impl fmt::Display for TailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Truncated { offset } => write!(f, "truncated at {offset}"),
            Self::Corrupt { offset, reason } => write!(f, "corrupt at {offset}: {reason}"),
        }
    }
}

/// Result of a recovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanOutcome {
    /// End of the last complete frame; the next append position.
    pub end: u64,
    /// Number of complete frames found.
    pub records: u64,
    /// Why the scan stopped.
    pub tail: TailState,
}

/// Scans a log whose file is `file_size` bytes long.
pub(crate) fn scan(backend: &dyn StorageBackend, file_size: u64) -> ScanOutcome {
    let mut offset = HEADER_SIZE as u64;
    let mut records = 0u64;

    let tail = loop {
        let remaining = file_size.saturating_sub(offset);
        if remaining == 0 {
            break TailState::Clean;
        }

        // Preallocated space reads back as zeros
        let want = remaining.min(RECORD_HEADER_SIZE as u64) as usize;
        let raw = match backend.read_at(offset, want) {
            Ok(raw) => raw,
            Err(e) => {
                break TailState::Corrupt {
                    offset,
                    reason: e.to_string(),
                }
            }
        };
        if raw.iter().all(|&b| b == 0) {
            break TailState::Clean;
        }
        let Ok(raw) = <[u8; RECORD_HEADER_SIZE]>::try_from(raw.as_slice()) else {
            break TailState::Truncated { offset };
        };

        let header = RecordHeader::parse(&raw);
        if let Err(e) = header.validate() {
            break TailState::Corrupt {
                offset,
                reason: e.to_string(),
            };
        }

        match offset.checked_add(header.frame_size()) {
            Some(end) if end <= file_size => {
                debug!(
                    lsn = offset,
                    size = header.size,
                    record_type = header.record_type,
                    key = %header.key,
                    "recovered record"
                );
                offset = end;
                records += 1;
            }
            _ => break TailState::Truncated { offset },
        }
    };

    ScanOutcome {
        end: offset,
        records,
        tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{BlobKey, RecordType};
    use binlog_storage::InMemoryBackend;

    fn frame(record_type: RecordType, body: &[u8]) -> Vec<u8> {
        let header = RecordHeader::new(record_type, BlobKey::default(), 0, body.len() as u64);
        let mut out = header.encode().to_vec();
        out.extend_from_slice(body);
        out
    }

    fn log_with(frames: &[Vec<u8>], tail: &[u8]) -> InMemoryBackend {
        let mut data = vec![0xEE; HEADER_SIZE];
        for f in frames {
            data.extend_from_slice(f);
        }
        data.extend_from_slice(tail);
        InMemoryBackend::with_data(data)
    }

    fn run(backend: &InMemoryBackend) -> ScanOutcome {
        scan(backend, backend.size().unwrap())
    }

    #[test]
    fn empty_log_is_clean() {
        let outcome = run(&log_with(&[], &[]));
        assert_eq!(
            outcome,
            ScanOutcome {
                end: 64,
                records: 0,
                tail: TailState::Clean
            }
        );
    }

    #[test]
    fn counts_complete_frames() {
        let frames = [frame(RecordType::Put, b"abc"), frame(RecordType::Remove, b"")];
        let outcome = run(&log_with(&frames, &[]));

        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.end, 64 + 99 + 96);
        assert!(outcome.tail.is_clean());
    }

    #[test]
    fn zeroed_preallocation_is_clean() {
        let frames = [frame(RecordType::Put, b"abc")];
        let outcome = run(&log_with(&frames, &[0; 1000]));

        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.end, 64 + 99);
        assert!(outcome.tail.is_clean());
    }

    #[test]
    fn short_zero_tail_is_clean() {
        let outcome = run(&log_with(&[], &[0; 10]));
        assert!(outcome.tail.is_clean());
        assert_eq!(outcome.end, 64);
    }

    #[test]
    fn partial_header_is_truncated() {
        let frames = [frame(RecordType::Put, b"abc")];
        let partial = &frame(RecordType::Put, b"xyz")[..40];
        let outcome = run(&log_with(&frames, partial));

        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.tail, TailState::Truncated { offset: 64 + 99 });
    }

    #[test]
    fn torn_body_is_truncated() {
        let torn = &frame(RecordType::Put, &[7; 50])[..96 + 20];
        let outcome = run(&log_with(&[], torn));

        assert_eq!(outcome.records, 0);
        assert_eq!(outcome.end, 64);
        assert_eq!(outcome.tail, TailState::Truncated { offset: 64 });
    }

    #[test]
    fn invalid_header_is_corrupt() {
        let mut bad = frame(RecordType::Put, b"abc");
        bad[24] = 1; // flags
        let frames = [frame(RecordType::Remove, b""), bad];
        let outcome = run(&log_with(&frames, &[]));

        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.end, 64 + 96);
        assert!(matches!(outcome.tail, TailState::Corrupt { offset: 160, .. }));
        assert_eq!(outcome.tail.offset(), Some(160));
    }

    #[test]
    fn display() {
        assert_eq!(TailState::Clean.to_string(), "clean");
        assert_eq!(
            TailState::Truncated { offset: 7 }.to_string(),
            "truncated at 7"
        );
    }
}
