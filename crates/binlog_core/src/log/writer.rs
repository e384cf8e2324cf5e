//! Appending records.

use super::Binlog;
use crate::error::{BinlogError, BinlogResult};
use crate::format::RECORD_HEADER_SIZE;
use crate::view::RecordView;
use tracing::{debug, error, warn};

impl Binlog {
    /// Appends `record` and returns the LSN it was written at.
    ///
    /// The frame is written at the append position as the record header,
    /// then the metadata, then the payload, followed by a data flush unless
    /// the log was opened with [`BinlogFlags::SYNC`]. The append position
    /// only moves once all of that succeeded, so after a failure it is
    /// unchanged, the partial frame is invisible to readers and replay, and
    /// the same append can be retried. The header slot of a failed frame is
    /// zeroed again where possible so a later open stops the log there.
    ///
    /// # Errors
    ///
    /// - [`BinlogError::InvalidArgument`] if the log was opened read-only
    /// - a format error if the record does not produce a valid header
    /// - a resource error if the file cannot be grown
    /// - an I/O error from a failed or short write, or from the flush
    ///
    /// [`BinlogFlags::SYNC`]: crate::BinlogFlags::SYNC
    pub fn append(&mut self, record: &RecordView) -> BinlogResult<u64> {
        if self.read_only {
            return Err(BinlogError::invalid_argument(format!(
                "{} is open read-only",
                self.path().display()
            )));
        }

        let header = record.header();
        header.validate()?;

        let lsn = self.append_position;
        let end = lsn.checked_add(header.frame_size()).ok_or_else(|| {
            BinlogError::resource_exhausted(format!("record of {} bytes does not fit", header.size))
        })?;

        if self.space.needs_growth(end) {
            self.space.ensure_capacity(self.backend.as_mut(), end)?;
        }

        if let Err(e) = self.write_frame(lsn, record) {
            self.discard_frame(lsn);
            return Err(e);
        }

        self.append_position = end;
        self.space.note_written(end);
        self.records += 1;

        debug!(
            lsn,
            size = header.size,
            record_type = %record.record_type(),
            key = %record.key(),
            "appended record"
        );
        Ok(lsn)
    }

    /// Writes header, metadata and payload at `lsn`, then flushes unless
    /// writes are synchronous.
    fn write_frame(&mut self, lsn: u64, record: &RecordView) -> BinlogResult<()> {
        let mut offset = lsn;
        self.write_part(offset, &record.header().encode(), "record header")?;
        offset += RECORD_HEADER_SIZE as u64;

        if !record.meta().is_empty() {
            self.write_part(offset, record.meta(), "metadata")?;
            offset += record.meta().len() as u64;
        }
        if !record.payload().is_empty() {
            self.write_part(offset, record.payload(), "payload")?;
        }

        if !self.config.is_synchronous() {
            self.backend.flush().map_err(|e| {
                error!(path = %self.config.path().display(), lsn, error = %e, "failed to flush record");
                e
            })?;
        }
        Ok(())
    }

    /// Zeroes the record header slot at `lsn` after a failed append, so the
    /// recovery scan ends the log there even inside preallocated space.
    fn discard_frame(&mut self, lsn: u64) {
        let zeros = [0u8; RECORD_HEADER_SIZE];
        let result = self
            .backend
            .write_at(lsn, &zeros)
            .and_then(|()| self.backend.flush());
        if let Err(e) = result {
            warn!(
                path = %self.config.path().display(),
                lsn,
                error = %e,
                "failed to discard partial record"
            );
        }
    }

    fn write_part(&mut self, offset: u64, data: &[u8], what: &str) -> BinlogResult<()> {
        self.backend.write_at(offset, data).map_err(|e| {
            error!(
                path = %self.config.path().display(),
                offset,
                len = data.len(),
                error = %e,
                "failed to write {what}"
            );
            e.into()
        })
    }
}
