//! File-based storage backend for persistent storage.

use crate::backend::{CacheAdvice, StorageBackend};
use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// All I/O is positioned (`pread`/`pwrite` on Unix), so the backend keeps no
/// cursor and every write lands exactly where the caller asked.
///
/// # Durability
///
/// - `flush()` calls `File::sync_data()`
/// - `sync()` calls `File::sync_all()`
/// - a backend opened with `synchronous = true` uses `O_SYNC`, so every
///   write is durable when it returns
///
/// # Locking
///
/// `try_lock_exclusive` takes a non-blocking `flock`-style lock through
/// `fs2`. The lock belongs to this open file, so a second `FileBackend` on
/// the same path conflicts even inside one process. Closing the file releases
/// it.
///
/// # Example
///
/// ```no_run
/// use binlog_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("binlog"), false).unwrap();
/// backend.try_lock_exclusive().unwrap();
/// backend.write_at(64, b"record").unwrap();
/// backend.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: File,
    synchronous: bool,
}

impl FileBackend {
    /// Creates a new file, failing if it already exists.
    ///
    /// The file is created with mode `0644` on Unix.
    ///
    /// # Errors
    ///
    /// Returns an I/O error; use [`StorageError::is_already_exists`] to
    /// detect a file that is already present.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        let file = options.open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            synchronous: false,
        })
    }

    /// Opens an existing file for reading and writing.
    ///
    /// With `synchronous` set, writes are forced to stable storage before
    /// they return.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path, synchronous: bool) -> StorageResult<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            if synchronous {
                options.custom_flags(nix::fcntl::OFlag::O_SYNC.bits());
            }
        }

        let file = options.open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            synchronous,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the file was opened with forced-synchronous writes.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    #[cfg(unix)]
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }

    #[cfg(unix)]
    fn pwrite(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.write_at(buf, offset)
    }

    #[cfg(windows)]
    fn pwrite(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_write(buf, offset)
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            match self.pread(&mut buffer[filled..], offset + filled as u64) {
                Ok(0) => {
                    let size = self.size()?;
                    return Err(StorageError::ReadPastEnd { offset, len, size });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(buffer)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let written = loop {
            match self.pwrite(data, offset) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        };

        if written != data.len() {
            return Err(StorageError::ShortWrite {
                offset,
                expected: data.len(),
                written,
            });
        }

        // O_SYNC is Unix-only; elsewhere emulate it per write
        #[cfg(not(unix))]
        {
            if self.synchronous {
                self.file.sync_data()?;
            }
        }

        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let size = self.size()?;

        if new_size > size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, size
                ),
            )));
        }

        self.file.set_len(new_size)?;
        Ok(())
    }

    fn allocate(&mut self, len: u64) -> StorageResult<()> {
        fs2::FileExt::allocate(&self.file, len)
            .map_err(|source| StorageError::Allocation { len, source })
    }

    fn try_lock_exclusive(&self) -> StorageResult<()> {
        fs2::FileExt::try_lock_exclusive(&self.file).map_err(|e| {
            if e.kind() == fs2::lock_contended_error().kind() {
                StorageError::Locked
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn unlock(&self) -> StorageResult<()> {
        fs2::FileExt::unlock(&self.file)?;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn advise(&self, advice: CacheAdvice) -> StorageResult<()> {
        use nix::fcntl::{posix_fadvise, PosixFadviseAdvice};
        use std::os::unix::io::AsRawFd;

        let advice = match advice {
            CacheAdvice::WillNeed => PosixFadviseAdvice::POSIX_FADV_WILLNEED,
            CacheAdvice::DontNeed => PosixFadviseAdvice::POSIX_FADV_DONTNEED,
        };

        // offset 0, len 0: the whole file
        posix_fadvise(self.file.as_raw_fd(), 0, 0, advice).map_err(io::Error::from)?;
        Ok(())
    }
}
