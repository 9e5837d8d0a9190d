//! Test fixtures: stores paired with a writer.
//!
//! Every fixture holds the store behind an `Arc`, ready for
//! [`ExclusiveWriter::submit_scoped`], together with a fresh writer.

use onewriter_core::{ExclusiveWriter, WriterConfig};
use onewriter_store::{FileBackend, LogStore, MemoryBackend, StorageBackend, StoreConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// In-memory store type used across the testkit.
pub type MemStore = LogStore<MemoryBackend>;

/// File-backed store type used across the testkit.
pub type FileStore = LogStore<FileBackend>;

/// Name of the log file inside a file fixture's directory.
pub const LOG_FILE: &str = "writes.log";

/// A store, a writer for it, and (for file stores) the directory holding it.
pub struct TestStore<B: StorageBackend + 'static> {
    /// The store.
    pub store: Arc<LogStore<B>>,
    /// A writer dedicated to this store.
    pub writer: Arc<ExclusiveWriter<LogStore<B>>>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore<MemoryBackend> {
    /// Creates an in-memory store with a default writer.
    pub fn memory() -> Self {
        Self::memory_with(WriterConfig::default())
    }

    /// Creates an in-memory store with a writer built from `config`.
    pub fn memory_with(config: WriterConfig) -> Self {
        Self {
            store: Arc::new(LogStore::in_memory()),
            writer: Arc::new(ExclusiveWriter::with_config(config)),
            _temp_dir: None,
        }
    }
}

impl TestStore<FileBackend> {
    /// Creates a file-backed store in a new temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LogStore::open_file(&temp_dir.path().join(LOG_FILE), StoreConfig::default())
            .expect("Failed to open file store");

        Self {
            store: Arc::new(store),
            writer: Arc::new(ExclusiveWriter::new()),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> PathBuf {
        self.dir().join(LOG_FILE)
    }

    fn dir(&self) -> &Path {
        self._temp_dir
            .as_ref()
            .map(TempDir::path)
            .expect("File store should have a directory")
    }

    /// Closes the store and opens it again from disk, replaying the log.
    ///
    /// Panics if a clone of the store is still alive, since the file lock
    /// is only released once every handle is gone.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            writer,
            _temp_dir,
        } = self;
        drop(store);

        let temp_dir = _temp_dir.expect("File store should have a directory");
        let store = LogStore::open_file(&temp_dir.path().join(LOG_FILE), StoreConfig::default())
            .expect("Failed to reopen file store");

        Self {
            store: Arc::new(store),
            writer,
            _temp_dir: Some(temp_dir),
        }
    }
}

impl<B: StorageBackend + 'static> std::ops::Deref for TestStore<B> {
    type Target = LogStore<B>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test against a fresh in-memory store and writer.
///
/// # Example
///
/// ```rust
/// use onewriter_testkit::with_memory_store;
///
/// with_memory_store(|store, writer| {
///     writer
///         .submit_scoped(store, |ctx| ctx.txn().unwrap().put("k", "v"))
///         .unwrap();
///     assert_eq!(store.len(), 1);
/// });
/// ```
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&Arc<MemStore>, &ExclusiveWriter<MemStore>) -> R,
{
    let fixture = TestStore::memory();
    f(&fixture.store, &fixture.writer)
}

/// Runs a test against a fresh file-backed store and writer.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Arc<FileStore>, &ExclusiveWriter<FileStore>, &Path) -> R,
{
    let fixture = TestStore::file();
    let path = fixture.path();
    f(&fixture.store, &fixture.writer, &path)
}

/// Store scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates an in-memory store holding `count` keys `key:0000`, `key:0001`,
    /// and so on, each committed through the writer.
    pub fn populated_store(count: usize) -> TestStore<MemoryBackend> {
        let fixture = TestStore::memory();
        for i in 0..count {
            fixture
                .writer
                .submit_scoped(&fixture.store, move |ctx| {
                    let txn = ctx.txn().expect("scoped task without transaction");
                    txn.put(format!("key:{i:04}"), format!("value-{i}"))
                })
                .expect("Failed to populate store");
        }
        fixture
    }
}
