//! Disk header codec.
//!
//! ```text
//! | magic (16) | version (2) | pad (6) | flags (8) | reserved (32) |
//! ```

use super::read_u64;
use crate::config::BinlogFlags;
use crate::error::{BinlogError, BinlogResult};
use binlog_storage::StorageBackend;

/// Magic bytes at the start of every binlog.
pub const BINLOG_MAGIC: [u8; 16] = *b"EBLOB-BINLOG\0\0\0\0";

/// The only format version this build reads and writes.
pub const BINLOG_VERSION: u16 = 1;

/// Size of the disk header, and the LSN of the first record.
pub const HEADER_SIZE: usize = 64;

const VERSION_OFFSET: usize = 16;
const FLAGS_OFFSET: usize = 24;

/// The fixed-size header at offset 0 of a binlog.
///
/// Fields are kept raw so that a header read from disk can be checked with
/// [`DiskHeader::validate`] before anything else looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskHeader {
    /// Magic bytes; must equal [`BINLOG_MAGIC`].
    pub magic: [u8; 16],
    /// Format version; must equal [`BINLOG_VERSION`].
    pub version: u16,
    /// Raw flag bits; must be a subset of [`BinlogFlags::all`].
    pub flags: u64,
}

impl DiskHeader {
    /// Creates a current-version header carrying `flags`.
    #[must_use]
    pub fn new(flags: BinlogFlags) -> Self {
        Self {
            magic: BINLOG_MAGIC,
            version: BINLOG_VERSION,
            flags: flags.bits(),
        }
    }

    /// Returns the recognised flags.
    #[must_use]
    pub fn flags(&self) -> BinlogFlags {
        BinlogFlags::from_bits_truncate(self.flags)
    }

    /// Replaces the flags.
    pub fn set_flags(&mut self, flags: BinlogFlags) {
        self.flags = flags.bits();
    }

    /// Checks magic, version and flags.
    ///
    /// # Errors
    ///
    /// - [`BinlogError::InvalidFormat`] on a magic mismatch or unknown flag
    ///   bits
    /// - [`BinlogError::UnsupportedVersion`] on any other version
    pub fn validate(&self) -> BinlogResult<()> {
        if self.magic != BINLOG_MAGIC {
            return Err(BinlogError::invalid_format(format!(
                "bad magic {:02x?}",
                self.magic
            )));
        }

        // Format conversion would hook in here
        if self.version != BINLOG_VERSION {
            return Err(BinlogError::UnsupportedVersion {
                found: self.version,
                supported: BINLOG_VERSION,
            });
        }

        let unknown = self.flags & !BinlogFlags::all().bits();
        if unknown != 0 {
            return Err(BinlogError::invalid_format(format!(
                "unknown header flags {unknown:#x}"
            )));
        }

        Ok(())
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..16].copy_from_slice(&self.magic);
        buf[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&self.version.to_le_bytes());
        buf[FLAGS_OFFSET..FLAGS_OFFSET + 8].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Deserializes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`BinlogError::InvalidFormat`] if `bytes` is shorter than
    /// [`HEADER_SIZE`], or any error from [`DiskHeader::validate`].
    pub fn decode(bytes: &[u8]) -> BinlogResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(BinlogError::invalid_format(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let mut magic = [0u8; 16];
        magic.copy_from_slice(&bytes[..16]);
        let header = Self {
            magic,
            version: u16::from_le_bytes([bytes[VERSION_OFFSET], bytes[VERSION_OFFSET + 1]]),
            flags: read_u64(bytes, FLAGS_OFFSET),
        };

        header.validate()?;
        Ok(header)
    }

    /// Writes the header at offset 0 and flushes it.
    ///
    /// # Errors
    ///
    /// Returns a format error if the header is not valid (a written header
    /// must be readable by us), or the storage error of the write or flush.
    pub fn write(&self, backend: &mut dyn StorageBackend) -> BinlogResult<()> {
        self.validate()?;
        backend.write_at(0, &self.encode())?;
        backend.flush()?;
        Ok(())
    }

    /// Reads and validates the header at offset 0.
    ///
    /// Nothing is returned unless the whole header validates.
    pub fn read(backend: &dyn StorageBackend) -> BinlogResult<Self> {
        let bytes = backend.read_at(0, HEADER_SIZE)?;
        Self::decode(&bytes)
    }
}

impl Default for DiskHeader {
    fn default() -> Self {
        Self::new(BinlogFlags::DEFAULTS)
    }
}
