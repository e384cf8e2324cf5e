//! Fault-injecting storage wrapper for crash-safety testing.
//!
//! [`FaultyBackend`] forwards every call to an inner backend until a fault is
//! armed through its [`FaultHandle`]. Write faults are one-shot: the armed
//! write fails and later writes go through again, which lets tests check that
//! a failed append can be retried.
//!
//! ## Usage
//!
//! ```rust
//! use binlog_storage::{FaultyBackend, InMemoryBackend, StorageBackend};
//!
//! let (mut backend, faults) = FaultyBackend::new(Box::new(InMemoryBackend::new()));
//! backend.write_at(0, b"ok").unwrap();
//!
//! faults.fail_nth_write(2);
//! backend.write_at(2, b"still ok").unwrap();
//! assert!(backend.write_at(10, b"boom").is_err());
//! backend.write_at(10, b"retry").unwrap();
//! ```

use crate::backend::{CacheAdvice, StorageBackend};
use crate::error::{StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const NEVER: usize = usize::MAX;

#[derive(Debug)]
struct FaultState {
    writes: AtomicUsize,
    fail_at_write: AtomicUsize,
    short_write: AtomicBool,
    fail_flush: AtomicBool,
    fail_allocate: AtomicBool,
    fail_advise: AtomicBool,
}

impl Default for FaultState {
    fn default() -> Self {
        Self {
            writes: AtomicUsize::new(0),
            fail_at_write: AtomicUsize::new(NEVER),
            short_write: AtomicBool::new(false),
            fail_flush: AtomicBool::new(false),
            fail_allocate: AtomicBool::new(false),
            fail_advise: AtomicBool::new(false),
        }
    }
}

/// Controls the faults injected by a [`FaultyBackend`].
///
/// The handle stays usable after the backend has been moved into a log.
#[derive(Debug, Clone)]
pub struct FaultHandle {
    state: Arc<FaultState>,
}

impl FaultHandle {
    /// Makes the `n`-th `write_at` from now fail without writing anything.
    ///
    /// `n = 1` fails the next write.
    pub fn fail_nth_write(&self, n: usize) {
        self.arm_write(n, false);
    }

    /// Makes the `n`-th `write_at` from now transfer only part of its data
    /// and report a short write.
    pub fn short_nth_write(&self, n: usize) {
        self.arm_write(n, true);
    }

    /// Sets whether `flush` and `sync` fail.
    pub fn set_fail_flush(&self, fail: bool) {
        self.state.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Sets whether `allocate` fails.
    pub fn set_fail_allocate(&self, fail: bool) {
        self.state.fail_allocate.store(fail, Ordering::SeqCst);
    }

    /// Sets whether `advise` fails.
    pub fn set_fail_advise(&self, fail: bool) {
        self.state.fail_advise.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of `write_at` calls seen so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    /// Disarms every fault.
    pub fn reset(&self) {
        self.state.fail_at_write.store(NEVER, Ordering::SeqCst);
        self.state.short_write.store(false, Ordering::SeqCst);
        self.state.fail_flush.store(false, Ordering::SeqCst);
        self.state.fail_allocate.store(false, Ordering::SeqCst);
        self.state.fail_advise.store(false, Ordering::SeqCst);
    }

    fn arm_write(&self, n: usize, short: bool) {
        let target = self.write_count().saturating_add(n.max(1));
        self.state.short_write.store(short, Ordering::SeqCst);
        self.state.fail_at_write.store(target, Ordering::SeqCst);
    }
}

/// A storage backend wrapper that injects failures on demand.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<FaultState>,
}

impl FaultyBackend {
    /// Wraps `inner` and returns the wrapper with its control handle.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, FaultHandle) {
        let state = Arc::new(FaultState::default());
        let handle = FaultHandle {
            state: Arc::clone(&state),
        };
        (Self { inner, state }, handle)
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("injected {what} failure"),
        ))
    }
}

impl std::fmt::Debug for FaultyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyBackend")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let count = self.state.writes.fetch_add(1, Ordering::SeqCst) + 1;

        if count == self.state.fail_at_write.load(Ordering::SeqCst) {
            self.state.fail_at_write.store(NEVER, Ordering::SeqCst);

            if self.state.short_write.load(Ordering::SeqCst) {
                let written = data.len() / 2;
                self.inner.write_at(offset, &data[..written])?;
                return Err(StorageError::ShortWrite {
                    offset,
                    expected: data.len(),
                    written,
                });
            }
            return Err(Self::injected("write"));
        }

        self.inner.write_at(offset, data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.state.fail_flush.load(Ordering::SeqCst) {
            return Err(Self::injected("flush"));
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.state.fail_flush.load(Ordering::SeqCst) {
            return Err(Self::injected("sync"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn allocate(&mut self, len: u64) -> StorageResult<()> {
        if self.state.fail_allocate.load(Ordering::SeqCst) {
            return Err(StorageError::Allocation {
                len,
                source: io::Error::new(io::ErrorKind::Other, "injected allocation failure"),
            });
        }
        self.inner.allocate(len)
    }

    fn try_lock_exclusive(&self) -> StorageResult<()> {
        self.inner.try_lock_exclusive()
    }

    fn unlock(&self) -> StorageResult<()> {
        self.inner.unlock()
    }

    fn advise(&self, advice: CacheAdvice) -> StorageResult<()> {
        if self.state.fail_advise.load(Ordering::SeqCst) {
            return Err(Self::injected("advise"));
        }
        self.inner.advise(advice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;

    fn faulty() -> (FaultyBackend, FaultHandle) {
        FaultyBackend::new(Box::new(InMemoryBackend::new()))
    }

    #[test]
    fn passes_through_when_disarmed() {
        let (mut backend, faults) = faulty();

        backend.write_at(0, b"abc").unwrap();
        backend.flush().unwrap();
        backend.allocate(16).unwrap();

        assert_eq!(backend.read_at(0, 3).unwrap(), b"abc");
        assert_eq!(backend.size().unwrap(), 16);
        assert_eq!(faults.write_count(), 1);
    }

    #[test]
    fn failed_write_is_one_shot() {
        let (mut backend, faults) = faulty();

        faults.fail_nth_write(1);
        assert!(backend.write_at(0, b"lost").is_err());
        assert_eq!(backend.size().unwrap(), 0);

        backend.write_at(0, b"kept").unwrap();
        assert_eq!(backend.read_at(0, 4).unwrap(), b"kept");
    }

    #[test]
    fn short_write_transfers_half() {
        let (mut backend, faults) = faulty();

        faults.short_nth_write(1);
        let err = backend.write_at(0, b"abcdef").unwrap_err();

        assert!(matches!(
            err,
            StorageError::ShortWrite { offset: 0, expected: 6, written: 3 }
        ));
        assert_eq!(backend.size().unwrap(), 3);
    }

    #[test]
    fn nth_write_counts_from_arming() {
        let (mut backend, faults) = faulty();
        backend.write_at(0, b"a").unwrap();

        faults.fail_nth_write(3);
        backend.write_at(1, b"b").unwrap();
        backend.write_at(2, b"c").unwrap();
        assert!(backend.write_at(3, b"d").is_err());
    }

    #[test]
    fn flush_allocate_and_advise_faults() {
        let (mut backend, faults) = faulty();

        faults.set_fail_flush(true);
        faults.set_fail_allocate(true);
        faults.set_fail_advise(true);

        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());
        assert!(matches!(
            backend.allocate(64),
            Err(StorageError::Allocation { len: 64, .. })
        ));
        assert!(backend.advise(CacheAdvice::WillNeed).is_err());

        faults.reset();
        backend.flush().unwrap();
        backend.allocate(64).unwrap();
        backend.advise(CacheAdvice::DontNeed).unwrap();
    }
}
