//! Benchmark utilities.

#![warn(missing_docs)]

use binlog_core::{Binlog, BinlogConfig, BlobKey, RecordType, RecordView, KEY_SIZE};
use binlog_storage::InMemoryBackend;
use rand::Rng;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random blob key.
pub fn random_key() -> BlobKey {
    let mut rng = rand::thread_rng();
    let mut key = [0u8; KEY_SIZE];
    rng.fill(&mut key[..]);
    BlobKey::new(key)
}

/// Generate put records with the specified payload size.
pub fn generate_records(count: usize, payload_size: usize) -> Vec<RecordView> {
    (0..count)
        .map(|_| {
            RecordView::new(RecordType::Put, random_key())
                .with_meta(random_data(16))
                .with_payload(random_data(payload_size))
        })
        .collect()
}

/// Opens an empty log over an in-memory backend.
pub fn memory_log(prealloc_step: u64) -> Binlog {
    let config = BinlogConfig::new("bench.binlog")
        .expect("valid path")
        .with_prealloc_step(prealloc_step);
    let mut backend = InMemoryBackend::new();
    Binlog::initialize(&config, &mut backend).expect("Failed to initialize log");
    Binlog::open_with_backend(config, Box::new(backend)).expect("Failed to open log")
}
