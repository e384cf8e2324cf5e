//! In-memory records.

use crate::format::{BlobKey, RecordHeader, RecordType, RECORD_HEADER_SIZE};
use bytes::Bytes;

/// A record as handed to [`Binlog::append`](crate::Binlog::append) and
/// returned by [`Binlog::read_at`](crate::Binlog::read_at).
///
/// Metadata and payload are reference-counted [`Bytes`], so a view read from
/// the log owns its buffers and releases them when dropped. Cloning a view
/// is cheap.
///
/// # Example
///
/// ```rust
/// use binlog_core::{BlobKey, RecordType, RecordView};
///
/// let view = RecordView::new(RecordType::Put, BlobKey::default())
///     .with_meta(&b"m"[..])
///     .with_payload(&b"hello"[..]);
/// assert_eq!(view.size(), 6);
/// assert_eq!(view.frame_size(), 96 + 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    record_type: RecordType,
    key: BlobKey,
    flags: u64,
    meta: Bytes,
    payload: Bytes,
}

impl RecordView {
    /// Creates a record with empty metadata and payload.
    #[must_use]
    pub fn new(record_type: RecordType, key: BlobKey) -> Self {
        Self {
            record_type,
            key,
            flags: 0,
            meta: Bytes::new(),
            payload: Bytes::new(),
        }
    }

    /// Creates a [`RecordType::Put`] record carrying `payload`.
    #[must_use]
    pub fn put(key: BlobKey, payload: impl Into<Bytes>) -> Self {
        Self::new(RecordType::Put, key).with_payload(payload)
    }

    /// Creates a [`RecordType::Remove`] record.
    #[must_use]
    pub fn remove(key: BlobKey) -> Self {
        Self::new(RecordType::Remove, key)
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: impl Into<Bytes>) -> Self {
        self.meta = meta.into();
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets the record flags. Only zero is accepted by the log.
    #[must_use]
    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &BlobKey {
        &self.key
    }

    /// Returns the record flags.
    #[must_use]
    pub fn flags(&self) -> u64 {
        self.flags
    }

    /// Returns the metadata.
    #[must_use]
    pub fn meta(&self) -> &Bytes {
        &self.meta
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the body size (metadata plus payload).
    #[must_use]
    pub fn size(&self) -> u64 {
        (self.meta.len() + self.payload.len()) as u64
    }

    /// Returns the on-disk frame size of this record.
    #[must_use]
    pub fn frame_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.size()
    }

    /// Builds the on-disk header for this record.
    #[must_use]
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            record_type: self.record_type.as_raw(),
            size: self.size(),
            meta_size: self.meta.len() as u64,
            flags: self.flags,
            key: self.key,
        }
    }

    /// Rebuilds a view from a validated header and its body.
    pub(crate) fn from_parts(
        record_type: RecordType,
        header: &RecordHeader,
        mut body: Bytes,
    ) -> Self {
        let meta = body.split_to(header.meta_size as usize);
        Self {
            record_type,
            key: header.key,
            flags: header.flags,
            meta,
            payload: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_buffers() {
        let view = RecordView::put(BlobKey::default(), &b"payload"[..]).with_meta(&b"meta"[..]);
        let header = view.header();

        assert_eq!(header.record_type, 1);
        assert_eq!(header.size, 11);
        assert_eq!(header.meta_size, 4);
        assert_eq!(header.flags, 0);
        assert_eq!(header.frame_size(), view.frame_size());
    }

    #[test]
    fn from_parts_splits_body() {
        let view = RecordView::put(BlobKey::default(), &b"world"[..]).with_meta(&b"hi"[..]);
        let header = view.header();

        let rebuilt =
            RecordView::from_parts(RecordType::Put, &header, Bytes::from_static(b"hiworld"));
        assert_eq!(rebuilt, view);
        assert_eq!(rebuilt.meta().as_ref(), b"hi");
        assert_eq!(rebuilt.payload().as_ref(), b"world");
    }

    #[test]
    fn remove_has_empty_body() {
        let view = RecordView::remove(BlobKey::default());
        assert_eq!(view.record_type(), RecordType::Remove);
        assert_eq!(view.size(), 0);
        assert_eq!(view.frame_size(), RECORD_HEADER_SIZE as u64);
    }
}
