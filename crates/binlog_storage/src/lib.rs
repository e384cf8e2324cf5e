//! # Binlog Storage
//!
//! Storage backends for the blob store binlog.
//!
//! Backends are **opaque byte stores** addressed by absolute offset. They know
//! nothing about log headers or records; `binlog_core` owns all format
//! interpretation.
//!
//! ## Design Principles
//!
//! - Positioned reads and writes (`read_at`, `write_at`), no implicit cursor
//! - Separate data flush (`flush`) and full flush (`sync`)
//! - Preallocation, exclusive advisory locking and page-cache hints are part
//!   of the backend so tests can substitute every one of them
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - persistent storage using OS file APIs
//! - [`InMemoryBackend`] - for tests and benchmarks
//! - [`FaultyBackend`] - wrapper that injects write, flush and allocation
//!   failures
//!
//! ## Example
//!
//! ```rust
//! use binlog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(6, 5).unwrap();
//! assert_eq!(&data, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod fault;
mod file;
mod memory;

pub use backend::{CacheAdvice, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use fault::{FaultHandle, FaultyBackend};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
