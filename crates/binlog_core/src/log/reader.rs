//! Random-access reads.

use super::Binlog;
use crate::error::{BinlogError, BinlogResult};
use crate::format::{RecordHeader, HEADER_SIZE, RECORD_HEADER_SIZE};
use crate::view::RecordView;
use binlog_storage::{StorageBackend, StorageError};
use bytes::Bytes;
use tracing::debug;

impl Binlog {
    /// Reads the record at `lsn`.
    ///
    /// Either the whole record is returned or an error is; no view is built
    /// from a partially read frame.
    ///
    /// # Errors
    ///
    /// - [`BinlogError::InvalidArgument`] if `lsn` lies inside the disk header
    /// - a format error if the record header does not validate
    /// - an I/O error if the frame extends past the append position
    pub fn read_at(&self, lsn: u64) -> BinlogResult<RecordView> {
        read_record(self.backend.as_ref(), lsn, self.append_position)
    }
}

/// Reads the frame at `lsn`, which must end at or before `end`.
///
/// `end` is the append position, so no frame beyond the log is returned and
/// the file length is never queried per record.
pub(super) fn read_record(
    backend: &dyn StorageBackend,
    lsn: u64,
    end: u64,
) -> BinlogResult<RecordView> {
    if lsn < HEADER_SIZE as u64 {
        return Err(BinlogError::invalid_argument(format!(
            "lsn {lsn} is inside the disk header"
        )));
    }

    let header = RecordHeader::read(backend, lsn)?;
    let record_type = header.kind().ok_or_else(|| {
        BinlogError::invalid_format(format!("unknown record type {}", header.record_type))
    })?;

    let offset = lsn + RECORD_HEADER_SIZE as u64;
    let len = usize::try_from(header.size).map_err(|_| {
        BinlogError::resource_exhausted(format!("record of {} bytes", header.size))
    })?;
    if offset.saturating_add(header.size) > end {
        return Err(StorageError::ReadPastEnd {
            offset,
            len,
            size: end,
        }
        .into());
    }

    let body = if len == 0 {
        Bytes::new()
    } else {
        Bytes::from(backend.read_at(offset, len)?)
    };

    debug!(lsn, size = header.size, record_type = %record_type, key = %header.key, "read record");
    Ok(RecordView::from_parts(record_type, &header, body))
}
