//! Record header codec.
//!
//! ```text
//! | type (8) | size (8) | meta_size (8) | flags (8) | key (64) |
//! ```
//!
//! `size` covers metadata and payload together; the body that follows the
//! header is `meta_size` bytes of metadata, then `size - meta_size` bytes of
//! payload.

use super::read_u64;
use crate::error::{BinlogError, BinlogResult};
use binlog_storage::StorageBackend;
use std::fmt;

/// Size of an encoded record header.
pub const RECORD_HEADER_SIZE: usize = 96;

/// Size of a blob key.
pub const KEY_SIZE: usize = 64;

/// Lower sentinel: no record has this type or a smaller one.
pub const RECORD_TYPE_FIRST: u64 = 0;

/// Upper sentinel: no record has this type or a larger one.
pub const RECORD_TYPE_LAST: u64 = 3;

/// The mutation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum RecordType {
    /// Update a blob.
    Put = 1,
    /// Remove a blob.
    Remove = 2,
}

impl RecordType {
    /// Decodes a raw type, returning `None` for sentinels and unknown values.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::Put),
            2 => Some(Self::Remove),
            _ => None,
        }
    }

    /// Returns the on-disk value.
    #[must_use]
    pub fn as_raw(self) -> u64 {
        self as u64
    }

    /// Returns a lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The 64-byte key of a blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobKey([u8; KEY_SIZE]);

impl BlobKey {
    /// Number of bytes shown by [`BlobKey::short_hex`] and `Display`.
    pub const SHORT_LEN: usize = 6;

    /// Creates a key from its raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a key from up to [`KEY_SIZE`] bytes, zero-padding the rest.
    ///
    /// # Errors
    ///
    /// Returns [`BinlogError::InvalidArgument`] if `bytes` is longer than
    /// [`KEY_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> BinlogResult<Self> {
        if bytes.len() > KEY_SIZE {
            return Err(BinlogError::invalid_argument(format!(
                "key is {} bytes, maximum is {KEY_SIZE}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Parses a hex string of up to `2 * KEY_SIZE` digits, zero-padding the
    /// rest.
    ///
    /// # Errors
    ///
    /// Returns [`BinlogError::InvalidArgument`] on an odd length, a non-hex
    /// digit or an over-long string.
    pub fn from_hex(hex: &str) -> BinlogResult<Self> {
        if hex.len() % 2 != 0 {
            return Err(BinlogError::invalid_argument(
                "hex key must have an even number of digits",
            ));
        }
        let bytes = hex
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or_else(|| BinlogError::invalid_argument(format!("bad hex key {hex:?}")))
            })
            .collect::<BinlogResult<Vec<u8>>>()?;
        Self::from_slice(&bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Returns the full key as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex_string(&self.0)
    }

    /// Returns the first [`BlobKey::SHORT_LEN`] bytes as lowercase hex.
    #[must_use]
    pub fn short_hex(&self) -> String {
        hex_string(&self.0[..Self::SHORT_LEN])
    }
}

impl Default for BlobKey {
    fn default() -> Self {
        Self([0; KEY_SIZE])
    }
}

impl From<[u8; KEY_SIZE]> for BlobKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_hex())
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({})", self.short_hex())
    }
}

fn hex_string(bytes: &[u8]) -> String {
    use fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// The fixed-size header preceding every record body.
///
/// Fields are raw so that headers read from disk can be inspected before
/// [`RecordHeader::validate`] rules on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw record type.
    pub record_type: u64,
    /// Metadata plus payload length.
    pub size: u64,
    /// Metadata length.
    pub meta_size: u64,
    /// Record flags; must be zero.
    pub flags: u64,
    /// Blob key.
    pub key: BlobKey,
}

impl RecordHeader {
    /// Creates a header for a body of `meta_size + payload_size` bytes.
    #[must_use]
    pub fn new(record_type: RecordType, key: BlobKey, meta_size: u64, payload_size: u64) -> Self {
        Self {
            record_type: record_type.as_raw(),
            size: meta_size + payload_size,
            meta_size,
            flags: 0,
            key,
        }
    }

    /// Returns the total on-disk size of the frame this header starts.
    ///
    /// Every position computation in the log goes through this.
    #[must_use]
    pub fn frame_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.size
    }

    /// Returns the payload length.
    #[must_use]
    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(self.meta_size)
    }

    /// Returns the decoded record type, if it is a real one.
    #[must_use]
    pub fn kind(&self) -> Option<RecordType> {
        RecordType::from_raw(self.record_type)
    }

    /// Checks the type range, the flags and the size split.
    pub fn validate(&self) -> BinlogResult<()> {
        if self.record_type <= RECORD_TYPE_FIRST || self.record_type >= RECORD_TYPE_LAST {
            return Err(BinlogError::invalid_format(format!(
                "record type {} out of range ({RECORD_TYPE_FIRST}, {RECORD_TYPE_LAST})",
                self.record_type
            )));
        }
        if self.flags != 0 {
            return Err(BinlogError::invalid_format(format!(
                "record flags {:#x} are not supported",
                self.flags
            )));
        }
        if self.meta_size > self.size {
            return Err(BinlogError::invalid_format(format!(
                "meta size {} exceeds record size {}",
                self.meta_size, self.size
            )));
        }
        if self.size > u64::MAX - RECORD_HEADER_SIZE as u64 {
            return Err(BinlogError::invalid_format(format!(
                "record size {} overflows a frame",
                self.size
            )));
        }
        Ok(())
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.record_type.to_le_bytes());
        buf[8..16].copy_from_slice(&self.size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.meta_size.to_le_bytes());
        buf[24..32].copy_from_slice(&self.flags.to_le_bytes());
        buf[32..].copy_from_slice(&self.key.0);
        buf
    }

    /// Deserializes a header without validating it.
    pub(crate) fn parse(bytes: &[u8; RECORD_HEADER_SIZE]) -> Self {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[32..]);
        Self {
            record_type: read_u64(bytes, 0),
            size: read_u64(bytes, 8),
            meta_size: read_u64(bytes, 16),
            flags: read_u64(bytes, 24),
            key: BlobKey(key),
        }
    }

    /// Deserializes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`BinlogError::InvalidFormat`] if `bytes` is not exactly
    /// [`RECORD_HEADER_SIZE`] long or the header does not validate.
    pub fn decode(bytes: &[u8]) -> BinlogResult<Self> {
        let bytes: &[u8; RECORD_HEADER_SIZE] = bytes.try_into().map_err(|_| {
            BinlogError::invalid_format(format!(
                "record header needs {RECORD_HEADER_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        let header = Self::parse(bytes);
        header.validate()?;
        Ok(header)
    }

    /// Reads and validates the record header at `offset`.
    pub fn read(backend: &dyn StorageBackend, offset: u64) -> BinlogResult<Self> {
        let bytes = backend.read_at(offset, RECORD_HEADER_SIZE)?;
        Self::decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn key(byte: u8) -> BlobKey {
        BlobKey::new([byte; KEY_SIZE])
    }

    #[test]
    fn encoded_layout() {
        let header = RecordHeader::new(RecordType::Remove, key(0xab), 3, 5);
        let bytes = header.encode();

        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &8u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &3u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &[0; 8]);
        assert!(bytes[32..].iter().all(|&b| b == 0xab));
    }

    #[test]
    fn frame_size_includes_header() {
        let header = RecordHeader::new(RecordType::Put, key(1), 4, 10);
        assert_eq!(header.frame_size(), 96 + 14);
        assert_eq!(header.payload_size(), 10);

        let empty = RecordHeader::new(RecordType::Remove, key(1), 0, 0);
        assert_eq!(empty.frame_size(), RECORD_HEADER_SIZE as u64);
    }

    #[test]
    fn sentinels_rejected() {
        for raw in [RECORD_TYPE_FIRST, RECORD_TYPE_LAST, 99] {
            let header = RecordHeader {
                record_type: raw,
                ..RecordHeader::new(RecordType::Put, key(1), 0, 1)
            };
            assert_eq!(header.validate().unwrap_err().kind(), ErrorKind::Format);
            assert_eq!(
                RecordHeader::decode(&header.encode()).unwrap_err().kind(),
                ErrorKind::Format
            );
        }
    }

    #[test]
    fn nonzero_flags_rejected() {
        let header = RecordHeader {
            flags: 1,
            ..RecordHeader::new(RecordType::Put, key(1), 0, 1)
        };
        assert_eq!(header.validate().unwrap_err().kind(), ErrorKind::Format);
        assert!(RecordHeader::decode(&header.encode()).is_err());
    }

    #[test]
    fn meta_larger_than_size_rejected() {
        let header = RecordHeader {
            meta_size: 9,
            ..RecordHeader::new(RecordType::Put, key(1), 4, 4)
        };
        assert!(header.validate().is_err());
    }

    #[test]
    fn overflowing_size_rejected() {
        let header = RecordHeader {
            size: u64::MAX,
            ..RecordHeader::new(RecordType::Put, key(1), 0, 0)
        };
        assert!(header.validate().is_err());
    }

    #[test]
    fn decode_wrong_length() {
        let err = RecordHeader::decode(&[0u8; 40]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn record_type_raw_values() {
        assert_eq!(RecordType::from_raw(1), Some(RecordType::Put));
        assert_eq!(RecordType::from_raw(2), Some(RecordType::Remove));
        assert_eq!(RecordType::from_raw(0), None);
        assert_eq!(RecordType::from_raw(3), None);
        assert_eq!(RecordType::Remove.as_raw(), 2);
        assert_eq!(RecordType::Put.to_string(), "put");
    }

    #[test]
    fn key_from_slice_pads() {
        let k = BlobKey::from_slice(b"abc").unwrap();
        assert_eq!(&k.as_bytes()[..3], b"abc");
        assert!(k.as_bytes()[3..].iter().all(|&b| b == 0));

        assert!(BlobKey::from_slice(&[0u8; KEY_SIZE + 1]).is_err());
    }

    #[test]
    fn key_hex() {
        let k = BlobKey::from_hex("00ff10").unwrap();
        assert_eq!(&k.as_bytes()[..3], &[0x00, 0xff, 0x10]);
        assert_eq!(k.short_hex(), "00ff10000000");
        assert_eq!(k.to_string(), "00ff10000000");
        assert_eq!(k.to_hex().len(), KEY_SIZE * 2);
        assert_eq!(BlobKey::from_hex(&k.to_hex()).unwrap(), k);

        assert!(BlobKey::from_hex("abc").is_err());
        assert!(BlobKey::from_hex("zz").is_err());
    }

    proptest! {
        #[test]
        fn valid_headers_round_trip(
            raw_type in 1u64..3,
            meta in 0u64..1 << 20,
            payload in 0u64..1 << 20,
            key_bytes in proptest::collection::vec(any::<u8>(), KEY_SIZE),
        ) {
            let record_type = RecordType::from_raw(raw_type).unwrap();
            let key = BlobKey::from_slice(&key_bytes).unwrap();
            let header = RecordHeader::new(record_type, key, meta, payload);

            let decoded = RecordHeader::decode(&header.encode()).unwrap();
            prop_assert_eq!(decoded, header);
            prop_assert_eq!(decoded.frame_size(), 96 + meta + payload);
        }
    }
}
