//! Preallocation of log space.

use crate::error::{BinlogError, BinlogResult};
use binlog_storage::StorageBackend;
use tracing::{debug, error};

/// Tracks how far the log file has been preallocated and grows it in whole
/// steps ahead of appends.
///
/// The tracked size never shrinks while the log is open, and only changes
/// after the backend has confirmed the allocation.
#[derive(Debug, Clone)]
pub struct SpaceManager {
    enabled: bool,
    step: u64,
    size: u64,
}

impl SpaceManager {
    /// Creates a manager for a file that is currently `size` bytes long.
    #[must_use]
    pub fn new(enabled: bool, step: u64, size: u64) -> Self {
        Self {
            enabled,
            step,
            size,
        }
    }

    /// Returns the preallocated size.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true if preallocation is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true if a write ending at `required_end` needs more space.
    #[must_use]
    pub fn needs_growth(&self, required_end: u64) -> bool {
        required_end >= self.size
    }

    /// Makes sure the file is preallocated past `required_end`.
    ///
    /// Grows in whole steps, so a record larger than one step gets as many
    /// steps as it needs. Does nothing when preallocation is disabled.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure (classified as resource exhaustion) or
    /// an invalid argument error if the target size overflows.
    pub fn ensure_capacity(
        &mut self,
        backend: &mut dyn StorageBackend,
        required_end: u64,
    ) -> BinlogResult<()> {
        if !self.enabled || !self.needs_growth(required_end) {
            return Ok(());
        }
        if self.step == 0 {
            return Err(BinlogError::invalid_argument(
                "preallocation step must be non-zero",
            ));
        }

        let steps = (required_end - self.size) / self.step + 1;
        let target = steps
            .checked_mul(self.step)
            .and_then(|grow| self.size.checked_add(grow))
            .ok_or_else(|| {
                BinlogError::invalid_argument(format!(
                    "preallocating past {required_end} overflows"
                ))
            })?;

        if let Err(e) = backend.allocate(target) {
            error!(size = self.size, target, error = %e, "preallocation failed");
            return Err(e.into());
        }

        debug!(from = self.size, to = target, "preallocated binlog space");
        self.size = target;
        Ok(())
    }

    /// Records that the file now extends to at least `end`.
    ///
    /// Without preallocation this is how the tracked size follows appends.
    pub fn note_written(&mut self, end: u64) {
        if end > self.size {
            self.size = end;
        }
    }
}
