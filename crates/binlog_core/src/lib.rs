//! # Binlog Core
//!
//! The write-ahead binlog of an embedded key-value blob store.
//!
//! Mutations (blob updates and removals) are appended here before they are
//! applied to the primary data files, so that background work on those files
//! can be redone after a crash by replaying the log.
//!
//! This crate provides:
//! - [`BinlogConfig`]: path, [`BinlogFlags`] and preallocation step
//! - [`Binlog`]: an open, exclusively locked log with append, read and replay
//! - the on-disk codecs in [`format`]
//!
//! ## Lifecycle
//!
//! ```text
//! BinlogConfig::new ──▶ Binlog::open ──▶ append / read_at / apply ──▶ Binlog::close
//!        ▲                                                                  │
//!        └──────────────────────── BinlogConfig ◀───────────────────────────┘
//! ```
//!
//! ## Recovery
//!
//! Opening a log scans it from the first record and stops at the first frame
//! that is not complete and valid. Everything before that point is the log;
//! the next append overwrites whatever follows. [`Binlog::tail_state`]
//! reports whether the scan stopped at a clean end or at a damaged frame.
//!
//! ## Example
//!
//! ```rust
//! use binlog_core::{Binlog, BinlogConfig, BlobKey, RecordView};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = BinlogConfig::new(dir.path().join("blob.binlog")).unwrap();
//!
//! let mut log = Binlog::open(config).unwrap();
//! let key = BlobKey::from_slice(b"some-blob").unwrap();
//! log.append(&RecordView::put(key, &b"new contents"[..])).unwrap();
//! log.append(&RecordView::remove(key)).unwrap();
//!
//! let applied = log.apply(|_lsn, _record| Ok(())).unwrap();
//! assert_eq!(applied, 2);
//! log.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod format;
mod log;
mod space;
mod view;

pub use config::{BinlogConfig, BinlogFlags, DEFAULT_PREALLOC_STEP, MAX_PATH_LEN};
pub use error::{BinlogError, BinlogResult, ErrorKind};
pub use format::{
    BlobKey, DiskHeader, RecordHeader, RecordType, BINLOG_MAGIC, BINLOG_VERSION, HEADER_SIZE,
    KEY_SIZE, RECORD_HEADER_SIZE,
};
pub use log::{Binlog, BinlogIter, TailState};
pub use space::SpaceManager;
pub use view::RecordView;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
