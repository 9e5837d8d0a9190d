//! Storage backend trait definition.

use crate::error::StoreResult;

/// A byte-level storage backend underneath [`LogStore`](crate::LogStore).
///
/// Backends are **opaque byte stores**: the log store owns the record framing
/// and the backend only reads, appends, syncs and truncates bytes.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` makes all appended data durable
/// - `truncate` only ever shrinks the storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadPastEnd`](crate::StoreError::ReadPastEnd)
    /// if the range extends past the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends data and returns the offset where it was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Makes everything appended so far durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StoreResult<()>;

    /// Returns the current size in bytes (the offset of the next append).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StoreResult<u64>;

    /// Returns true if nothing has been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncates the storage to `new_len` bytes.
    ///
    /// Used to discard a partially appended commit and a torn tail found
    /// during replay.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_len` is larger than the current size or the
    /// truncation fails.
    fn truncate(&mut self, new_len: u64) -> StoreResult<()>;
}
