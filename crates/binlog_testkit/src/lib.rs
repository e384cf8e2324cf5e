//! # Binlog Testkit
//!
//! Test utilities for the blob store binlog.
//!
//! This crate provides:
//! - Test fixtures and log helpers
//! - Property-based test generators using proptest
//! - A crash harness built on fault-injecting storage
//! - On-disk format test vectors
//!
//! ## Usage
//!
//! ```rust
//! use binlog_testkit::prelude::*;
//!
//! with_temp_log(|log| {
//!     for record in sample_records(3) {
//!         log.append(&record).unwrap();
//!     }
//!     assert_eq!(log.record_count(), 3);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
