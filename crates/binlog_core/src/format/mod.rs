//! On-disk format of the binlog.
//!
//! ```text
//! | disk header (64) | record header (96) | meta | payload | record header (96) | ...
//! ```
//!
//! All integers are little-endian. Frames follow each other with no padding;
//! the first frame starts at [`HEADER_SIZE`], which is also the smallest
//! valid LSN.

mod header;
mod record;

pub use header::{DiskHeader, BINLOG_MAGIC, BINLOG_VERSION, HEADER_SIZE};
pub use record::{
    BlobKey, RecordHeader, RecordType, KEY_SIZE, RECORD_HEADER_SIZE, RECORD_TYPE_FIRST,
    RECORD_TYPE_LAST,
};

/// Reads a little-endian `u64` at `at`. The caller guarantees the bounds.
pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}
