//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend holding an exclusive advisory lock.
///
/// The lock is taken when the file is opened and released when the backend
/// is dropped, so at most one backend (in this or any other process) writes
/// a given log file at a time.
///
/// # Durability
///
/// `sync()` calls `File::sync_data()`; appended bytes are not guaranteed to
/// survive a crash until it returns.
///
/// # Example
///
/// ```no_run
/// use onewriter_store::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("writes.log")).unwrap();
/// backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileBackend {
    /// Opens or creates the file at `path` and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another handle holds the lock, or an
    /// I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Opens the file, creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened and locked.
    pub fn open_with_create_dirs(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if offset > self.size || end > self.size {
            return Err(StoreError::ReadPastEnd {
                offset,
                len,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> StoreResult<()> {
        let file = self.file.get_mut();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.size)
    }

    fn truncate(&mut self, new_len: u64) -> StoreResult<()> {
        if new_len > self.size {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot truncate to {new_len} bytes, only {} stored", self.size),
            )));
        }

        let file = self.file.get_mut();
        file.set_len(new_len)?;
        file.sync_all()?;
        self.size = new_len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writes.log");

        let mut backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.read_at(0, 11).unwrap(), b"hello world");
        assert!(matches!(
            backend.read_at(10, 5),
            Err(StoreError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writes.log");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.len().unwrap(), 15);
        assert_eq!(backend.read_at(0, 15).unwrap(), b"persistent data");
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writes.log");

        let first = FileBackend::open(&path).unwrap();
        assert!(matches!(FileBackend::open(&path), Err(StoreError::Locked)));

        drop(first);
        assert!(FileBackend::open(&path).is_ok());
    }

    #[test]
    fn truncate_discards_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writes.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"keep|drop").unwrap();
        backend.truncate(4).unwrap();
        assert_eq!(backend.len().unwrap(), 4);
        assert!(backend.truncate(40).is_err());

        let offset = backend.append(b"!").unwrap();
        assert_eq!(offset, 4);
        assert_eq!(backend.read_at(0, 5).unwrap(), b"keep!");
    }

    #[test]
    fn creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("writes.log");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert!(backend.is_empty().unwrap());
        assert_eq!(backend.path(), path);
    }
}
