//! Replay of the log into the primary store.

use super::reader::read_record;
use super::Binlog;
use crate::error::{BinlogError, BinlogResult};
use crate::format::HEADER_SIZE;
use crate::view::RecordView;
use binlog_storage::StorageBackend;
use std::iter::FusedIterator;
use tracing::{error, info};

impl Binlog {
    /// Feeds every record to `applier` in log order and returns how many
    /// were applied.
    ///
    /// The applier gets each record's LSN and a borrowed view; the view is
    /// dropped once the applier returns. The first read error or applier
    /// error stops the replay and is returned.
    ///
    /// Appends cannot happen during a replay: this borrows the log shared,
    /// [`Binlog::append`] needs it exclusively.
    ///
    /// # Example
    ///
    /// ```rust
    /// use binlog_core::{Binlog, BinlogConfig, BlobKey, RecordView};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let mut log = Binlog::open(BinlogConfig::new(dir.path().join("log")).unwrap()).unwrap();
    /// log.append(&RecordView::put(BlobKey::default(), &b"a"[..])).unwrap();
    /// log.append(&RecordView::remove(BlobKey::default())).unwrap();
    ///
    /// let mut seen = Vec::new();
    /// let applied = log.apply(|lsn, record| {
    ///     seen.push((lsn, record.record_type()));
    ///     Ok(())
    /// }).unwrap();
    /// assert_eq!(applied, 2);
    /// # log.close().unwrap();
    /// ```
    pub fn apply<F>(&self, mut applier: F) -> BinlogResult<u64>
    where
        F: FnMut(u64, &RecordView) -> BinlogResult<()>,
    {
        info!(
            path = %self.path().display(),
            end = self.append_position,
            "replaying binlog"
        );

        let mut applied = 0u64;
        for entry in self.iter() {
            let (lsn, record) = entry.map_err(|e| {
                error!(path = %self.path().display(), applied, error = %e, "failed to read record");
                e
            })?;
            applier(lsn, &record).map_err(|e| {
                error!(path = %self.path().display(), lsn, error = %e, "applier failed");
                e
            })?;
            applied += 1;
        }

        info!(
            path = %self.path().display(),
            end = self.append_position,
            applied,
            "binlog replay finished"
        );
        Ok(applied)
    }

    /// Returns an iterator over all records.
    #[must_use]
    pub fn iter(&self) -> BinlogIter<'_> {
        BinlogIter {
            backend: self.backend.as_ref(),
            offset: HEADER_SIZE as u64,
            end: self.append_position,
            done: false,
        }
    }

    /// Returns an iterator over the records from `lsn` on.
    ///
    /// `lsn` must be the start of a frame; anything else surfaces as an
    /// error on the first item.
    pub fn iter_from(&self, lsn: u64) -> BinlogResult<BinlogIter<'_>> {
        if lsn < HEADER_SIZE as u64 {
            return Err(BinlogError::invalid_argument(format!(
                "lsn {lsn} is inside the disk header"
            )));
        }
        Ok(BinlogIter {
            offset: lsn,
            ..self.iter()
        })
    }
}

impl<'a> IntoIterator for &'a Binlog {
    type Item = BinlogResult<(u64, RecordView)>;
    type IntoIter = BinlogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Streaming iterator over `(lsn, record)` pairs, reading one frame at a
/// time.
///
/// Stops at the append position the log had when the iterator was created,
/// and yields nothing more after the first error.
pub struct BinlogIter<'a> {
    backend: &'a dyn StorageBackend,
    offset: u64,
    end: u64,
    done: bool,
}

impl Iterator for BinlogIter<'_> {
    type Item = BinlogResult<(u64, RecordView)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.end {
            return None;
        }

        let lsn = self.offset;
        match read_record(self.backend, lsn, self.end) {
            Ok(record) => {
                self.offset = lsn + record.frame_size();
                Some(Ok((lsn, record)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for BinlogIter<'_> {}

impl std::fmt::Debug for BinlogIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinlogIter")
            .field("offset", &self.offset)
            .field("end", &self.end)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
