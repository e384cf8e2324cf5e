//! On-disk format test vectors.
//!
//! Each vector pairs an encoded disk header or record frame with the
//! values it must decode to, or the error class it must be rejected with.
//! The expected bytes are spelled out field by field so they do not depend
//! on the encoder under test.

use serde::{Deserialize, Serialize};

const MAGIC_HEX: &str = "45424c4f422d42494e4c4f4700000000";

/// A format test vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Encoded bytes (hex-encoded).
    pub encoded_hex: String,
    /// Expected error kind (if decoding should fail).
    pub expected_error: Option<String>,
}

fn zeros(bytes: usize) -> String {
    "00".repeat(bytes)
}

fn le64(value: u64) -> String {
    value.to_le_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

fn header_hex(magic: &str, version: &str, flags: u64) -> String {
    format!("{magic}{version}{}{}{}", zeros(6), le64(flags), zeros(32))
}

fn record_hex(record_type: u64, size: u64, meta_size: u64, flags: u64, key_first: u8) -> String {
    format!(
        "{}{}{}{}{key_first:02x}{}",
        le64(record_type),
        le64(size),
        le64(meta_size),
        le64(flags),
        zeros(63)
    )
}

/// Disk header test vectors.
pub fn disk_header_vectors() -> Vec<TestVector> {
    vec![
        TestVector {
            id: "header_default".into(),
            description: "Version 1 header with preallocation".into(),
            encoded_hex: header_hex(MAGIC_HEX, "0100", 1),
            expected_error: None,
        },
        TestVector {
            id: "header_prealloc_sync".into(),
            description: "Version 1 header with preallocation and synchronous writes".into(),
            encoded_hex: header_hex(MAGIC_HEX, "0100", 3),
            expected_error: None,
        },
        TestVector {
            id: "header_no_flags".into(),
            description: "Version 1 header without flags".into(),
            encoded_hex: header_hex(MAGIC_HEX, "0100", 0),
            expected_error: None,
        },
        TestVector {
            id: "header_bad_magic".into(),
            description: "Magic with a flipped byte".into(),
            encoded_hex: header_hex("46424c4f422d42494e4c4f4700000000", "0100", 1),
            expected_error: Some("format".into()),
        },
        TestVector {
            id: "header_version_2".into(),
            description: "Unsupported format version".into(),
            encoded_hex: header_hex(MAGIC_HEX, "0200", 1),
            expected_error: Some("format".into()),
        },
        TestVector {
            id: "header_unknown_flag".into(),
            description: "Flag bit outside the recognised set".into(),
            encoded_hex: header_hex(MAGIC_HEX, "0100", 1 << 8),
            expected_error: Some("format".into()),
        },
    ]
}

/// Record frame test vectors.
pub fn record_vectors() -> Vec<TestVector> {
    vec![
        TestVector {
            id: "record_put_hello".into(),
            description: "PUT with payload \"hello\" and no metadata".into(),
            encoded_hex: format!("{}68656c6c6f", record_hex(1, 5, 0, 0, 0x01)),
            expected_error: None,
        },
        TestVector {
            id: "record_put_meta".into(),
            description: "PUT with metadata \"m\" and payload \"ab\"".into(),
            encoded_hex: format!("{}6d6162", record_hex(1, 3, 1, 0, 0x02)),
            expected_error: None,
        },
        TestVector {
            id: "record_remove".into(),
            description: "REMOVE with empty body".into(),
            encoded_hex: record_hex(2, 0, 0, 0, 0x03),
            expected_error: None,
        },
        TestVector {
            id: "record_first_sentinel".into(),
            description: "Type equal to the lower sentinel".into(),
            encoded_hex: record_hex(0, 0, 0, 0, 0x04),
            expected_error: Some("format".into()),
        },
        TestVector {
            id: "record_last_sentinel".into(),
            description: "Type equal to the upper sentinel".into(),
            encoded_hex: record_hex(3, 0, 0, 0, 0x05),
            expected_error: Some("format".into()),
        },
        TestVector {
            id: "record_flags".into(),
            description: "Nonzero record flags".into(),
            encoded_hex: record_hex(1, 0, 0, 1, 0x06),
            expected_error: Some("format".into()),
        },
        TestVector {
            id: "record_meta_too_large".into(),
            description: "Metadata size larger than the body".into(),
            encoded_hex: record_hex(1, 2, 3, 0, 0x07),
            expected_error: Some("format".into()),
        },
    ]
}

/// Generate all test vectors as JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        header: disk_header_vectors(),
        record: record_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    header: Vec<TestVector>,
    record: Vec<TestVector>,
}

/// Decodes a hex string.
///
/// # Panics
///
/// Panics on malformed input.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}
