//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random records and record
//! headers that maintain the format's invariants.

use binlog_core::{BlobKey, RecordHeader, RecordType, RecordView, KEY_SIZE};
use proptest::prelude::*;

/// Strategy for generating blob keys.
pub fn blob_key_strategy() -> impl Strategy<Value = BlobKey> + Clone {
    prop::collection::vec(any::<u8>(), KEY_SIZE)
        .prop_map(|bytes| BlobKey::from_slice(&bytes).expect("KEY_SIZE bytes fit"))
}

/// Strategy for generating valid record types.
pub fn record_type_strategy() -> impl Strategy<Value = RecordType> {
    prop_oneof![Just(RecordType::Put), Just(RecordType::Remove)]
}

/// Strategy for generating metadata buffers (often empty).
pub fn meta_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(Vec::new()),
        prop::collection::vec(any::<u8>(), 1..256),
    ]
}

/// Strategy for generating payload buffers.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// Strategy for generating valid records.
pub fn record_strategy() -> impl Strategy<Value = RecordView> {
    (
        record_type_strategy(),
        blob_key_strategy(),
        meta_strategy(),
        payload_strategy(),
    )
        .prop_map(|(record_type, key, meta, payload)| {
            RecordView::new(record_type, key)
                .with_meta(meta)
                .with_payload(payload)
        })
}

/// Strategy for generating a sequence of records.
pub fn record_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<RecordView>> {
    prop::collection::vec(record_strategy(), 0..=max_len)
}

/// Strategy for generating record headers that fail validation.
pub fn invalid_record_header_strategy() -> impl Strategy<Value = RecordHeader> {
    let base = (blob_key_strategy(), 0u64..1024, 0u64..1024).prop_map(|(key, meta, payload)| {
        RecordHeader::new(RecordType::Put, key, meta, payload)
    });

    prop_oneof![
        // Sentinel or unknown type
        (base.clone(), prop_oneof![Just(0u64), Just(3u64), 4u64..]).prop_map(
            |(header, record_type)| RecordHeader {
                record_type,
                ..header
            }
        ),
        // Nonzero flags
        (base.clone(), 1u64..).prop_map(|(header, flags)| RecordHeader { flags, ..header }),
        // Metadata larger than the body
        base.prop_map(|header| RecordHeader {
            meta_size: header.size + 1,
            ..header
        }),
    ]
}
