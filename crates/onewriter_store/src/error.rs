//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in stores, transactions and storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The log contents could not be decoded.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another write transaction is already open on the store.
    #[error("store busy: another write transaction is open")]
    Busy,

    /// Another process holds the storage file lock.
    #[error("storage locked: another process has exclusive access")]
    Locked,

    /// The transaction was already committed or rolled back.
    #[error("transaction already {0}")]
    TransactionFinished(&'static str),

    /// A fault injected by a test backend.
    #[error("injected fault: {0}")]
    Injected(String),
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Returns true if this is the single-writer refusal.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}
