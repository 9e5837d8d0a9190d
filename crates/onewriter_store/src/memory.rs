//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An in-memory storage backend.
///
/// Suitable for tests and ephemeral stores. Cloning a `MemoryBackend`
/// yields another handle to the same bytes, which lets a test reopen a
/// [`LogStore`](crate::LogStore) over what a previous one wrote.
///
/// The backend can be told to fail upcoming syncs, which is how commit
/// failures are simulated.
///
/// # Example
///
/// ```rust
/// use onewriter_store::{MemoryBackend, StorageBackend};
///
/// let mut backend = MemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.len().unwrap(), 9);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
    failing_syncs: Arc<AtomicUsize>,
}

impl MemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding pre-existing bytes.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            failing_syncs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a copy of all bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Makes the next `count` calls to `sync` fail.
    pub fn fail_next_syncs(&self, count: usize) {
        self.failing_syncs.store(count, Ordering::SeqCst);
    }
}

impl StorageBackend for MemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StoreError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StoreResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn sync(&mut self) -> StoreResult<()> {
        let injected = self
            .failing_syncs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Injected("sync failed".into()));
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_len: u64) -> StoreResult<()> {
        let mut data = self.data.write();
        let current = data.len() as u64;
        if new_len > current {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot truncate to {new_len} bytes, only {current} stored"),
            )));
        }
        data.truncate(new_len as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_offsets() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.len().unwrap(), 11);
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn read_past_end_fails() {
        let mut backend = MemoryBackend::new();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(3, 10),
            Err(StoreError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            backend.read_at(10, 0),
            Err(StoreError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn clones_share_bytes() {
        let mut backend = MemoryBackend::new();
        let other = backend.clone();
        backend.append(b"shared").unwrap();
        assert_eq!(other.data(), b"shared");
    }

    #[test]
    fn injected_sync_failures_are_counted() {
        let mut backend = MemoryBackend::new();
        backend.fail_next_syncs(2);

        assert!(matches!(backend.sync(), Err(StoreError::Injected(_))));
        assert!(backend.sync().is_err());
        assert!(backend.sync().is_ok());
    }

    #[test]
    fn truncate_shrinks_only() {
        let mut backend = MemoryBackend::with_data(b"hello world".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"hello");
        assert!(backend.truncate(100).is_err());
        assert!(!backend.is_empty().unwrap());
    }
}
