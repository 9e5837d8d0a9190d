//! Single-writer append-log key/value store.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;
use crate::log::record::{Batch, BatchOp, Decoded};
use crate::memory::MemoryBackend;
use crate::store::{Store, Transaction};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for opening a [`LogStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to sync the backend on every commit.
    pub sync_on_commit: bool,

    /// Whether to create the log file if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether to create a missing log file.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

/// What replay found when the store was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Complete batches applied.
    pub batches: u64,
    /// Length of the valid prefix of the log.
    pub valid_len: u64,
    /// Bytes dropped from a torn or corrupt tail.
    pub discarded: u64,
}

struct Shared<B> {
    backend: Mutex<B>,
    index: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    writer_open: AtomicBool,
    commits: AtomicU64,
    recovery: Recovery,
    config: StoreConfig,
}

/// An append-only key/value log that admits one writer at a time.
///
/// Committed batches are appended to a [`StorageBackend`] and applied to an
/// in-memory index. Like an embedded SQL database in rollback-journal mode,
/// the store refuses a second concurrent write transaction with
/// [`StoreError::Busy`] instead of queueing it.
///
/// Cloning yields another handle to the same store.
///
/// # Example
///
/// ```rust
/// use onewriter_store::{LogStore, Store, Transaction};
///
/// let store = LogStore::in_memory();
/// let mut txn = store.begin().unwrap();
/// txn.put("greeting", "hello").unwrap();
/// txn.commit().unwrap();
/// assert_eq!(store.get(b"greeting"), Some(b"hello".to_vec()));
/// ```
pub struct LogStore<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for LogStore<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl LogStore<MemoryBackend> {
    /// Opens an empty store in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(
            MemoryBackend::new(),
            BTreeMap::new(),
            Recovery::default(),
            StoreConfig::default(),
        )
    }
}

impl LogStore<FileBackend> {
    /// Opens (or creates) a file-backed store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing and `create_if_missing` is
    /// false, if another handle holds the file lock, or if replay fails.
    pub fn open_file(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        if !config.create_if_missing && !path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no log at {}", path.display()),
            )));
        }
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::open(backend, config)
    }
}

impl<B: StorageBackend> LogStore<B> {
    /// Opens a store over `backend`, replaying every complete batch.
    ///
    /// A torn or corrupt tail is truncated away and reported through
    /// [`LogStore::recovery`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or truncated.
    pub fn open(mut backend: B, config: StoreConfig) -> StoreResult<Self> {
        let len = backend.len()?;
        let bytes = backend.read_at(0, len as usize)?;

        let mut index = BTreeMap::new();
        let recovery = replay(&bytes, |batch| apply(&mut index, batch));
        if recovery.discarded > 0 {
            backend.truncate(recovery.valid_len)?;
        }
        debug!(
            batches = recovery.batches,
            discarded = recovery.discarded,
            "log replayed"
        );

        Ok(Self::from_parts(backend, index, recovery, config))
    }

    fn from_parts(
        backend: B,
        index: BTreeMap<Vec<u8>, Vec<u8>>,
        recovery: Recovery,
        config: StoreConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend: Mutex::new(backend),
                index: RwLock::new(index),
                writer_open: AtomicBool::new(false),
                commits: AtomicU64::new(recovery.batches),
                recovery,
                config,
            }),
        }
    }

    /// Returns the committed value for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.shared.index.read().get(key).cloned()
    }

    /// Returns all committed keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.shared.index.read().keys().cloned().collect()
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.index.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of committed batches, including replayed ones.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Returns true while a write transaction is open.
    #[must_use]
    pub fn is_writer_open(&self) -> bool {
        self.shared.writer_open.load(Ordering::SeqCst)
    }

    /// Returns the size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn log_len(&self) -> StoreResult<u64> {
        self.shared.backend.lock().len()
    }

    /// Returns what replay found when the store was opened.
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        self.shared.recovery
    }
}

impl<B: StorageBackend> Store for LogStore<B> {
    type Txn = LogTransaction<B>;

    fn begin(&self) -> StoreResult<LogTransaction<B>> {
        if self
            .shared
            .writer_open
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StoreError::Busy);
        }
        Ok(LogTransaction {
            shared: Arc::clone(&self.shared),
            writes: BTreeMap::new(),
            state: TxnState::Active,
        })
    }
}

impl<B> std::fmt::Debug for LogStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("keys", &self.shared.index.read().len())
            .field("commits", &self.shared.commits.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    RolledBack,
}

/// The single open write transaction of a [`LogStore`].
///
/// Writes are buffered until commit. Dropping an active transaction rolls
/// it back and frees the writer slot.
pub struct LogTransaction<B> {
    shared: Arc<Shared<B>>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    state: TxnState,
}

impl<B: StorageBackend> LogTransaction<B> {
    /// Buffers a put.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionFinished`] after commit or rollback.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(key.into(), Some(value.into()));
        Ok(())
    }

    /// Buffers a delete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionFinished`] after commit or rollback.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(key.into(), None);
        Ok(())
    }

    /// Reads `key`, seeing this transaction's own pending writes.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(pending) => pending.clone(),
            None => self.shared.index.read().get(key).cloned(),
        }
    }

    /// Returns the number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TxnState::Active => Ok(()),
            TxnState::Committed => Err(StoreError::TransactionFinished("committed")),
            TxnState::RolledBack => Err(StoreError::TransactionFinished("rolled back")),
        }
    }

    fn finish(&mut self, state: TxnState) {
        self.state = state;
        self.writes.clear();
        self.shared.writer_open.store(false, Ordering::SeqCst);
    }

    fn persist(&self) -> StoreResult<()> {
        let batch = Batch {
            ops: self
                .writes
                .iter()
                .map(|(key, value)| match value {
                    Some(value) => BatchOp::Put {
                        key: key.clone(),
                        value: value.clone(),
                    },
                    None => BatchOp::Delete { key: key.clone() },
                })
                .collect(),
        };
        let frame = batch.encode();

        let mut backend = self.shared.backend.lock();
        let start = backend.len()?;
        let written = backend.append(&frame).and_then(|_| {
            if self.shared.config.sync_on_commit {
                backend.sync()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            if let Err(undo) = backend.truncate(start) {
                warn!(error = %undo, "failed to discard partial commit");
            }
            return Err(e);
        }

        apply(&mut *self.shared.index.write(), batch);
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<B: StorageBackend> Transaction for LogTransaction<B> {
    fn commit(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        if self.writes.is_empty() {
            self.finish(TxnState::Committed);
            return Ok(());
        }

        let result = self.persist();
        let state = if result.is_ok() {
            TxnState::Committed
        } else {
            TxnState::RolledBack
        };
        self.finish(state);
        result
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        self.finish(TxnState::RolledBack);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }
}

impl<B> Drop for LogTransaction<B> {
    fn drop(&mut self) {
        if self.state == TxnState::Active {
            self.shared.writer_open.store(false, Ordering::SeqCst);
        }
    }
}

impl<B> std::fmt::Debug for LogTransaction<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogTransaction")
            .field("writes", &self.writes.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Checks a log image without applying or repairing anything.
///
/// Reports the same [`Recovery`] that opening a store over `bytes` would,
/// so a log can be verified while another process holds its lock.
#[must_use]
pub fn scan(bytes: &[u8]) -> Recovery {
    replay(bytes, |_| {})
}

fn replay(bytes: &[u8], mut on_batch: impl FnMut(Batch)) -> Recovery {
    let mut recovery = Recovery::default();
    let mut pos = 0usize;
    while pos < bytes.len() {
        match Batch::decode(&bytes[pos..]) {
            Ok(Decoded::Frame(batch, used)) => {
                on_batch(batch);
                recovery.batches += 1;
                pos += used;
            }
            Ok(Decoded::Torn) => {
                warn!(offset = pos, "torn batch at end of log");
                break;
            }
            Err(e) => {
                warn!(offset = pos, error = %e, "corrupt batch in log");
                break;
            }
        }
    }

    recovery.valid_len = pos as u64;
    recovery.discarded = (bytes.len() - pos) as u64;
    recovery
}

fn apply(index: &mut BTreeMap<Vec<u8>, Vec<u8>>, batch: Batch) {
    for op in batch.ops {
        match op {
            BatchOp::Put { key, value } => {
                index.insert(key, value);
            }
            BatchOp::Delete { key } => {
                index.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_reports_without_repairing() {
        let store = LogStore::in_memory();
        let mut txn = store.begin().unwrap();
        txn.put("a", "1").unwrap();
        txn.commit().unwrap();

        let intact = store.log_len().unwrap();
        let mut image = store.shared.backend.lock().read_at(0, intact as usize).unwrap();
        image.extend_from_slice(b"OWLB\x10");

        let report = scan(&image);
        assert_eq!(report.batches, 1);
        assert_eq!(report.valid_len, intact);
        assert_eq!(report.discarded, 5);
    }

    #[test]
    fn commit_makes_writes_visible() {
        let store = LogStore::in_memory();
        let mut txn = store.begin().unwrap();
        txn.put("a", "1").unwrap();
        txn.put("b", "2").unwrap();
        assert_eq!(store.get(b"a"), None);

        txn.commit().unwrap();
        assert_eq!(store.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(store.len(), 2);
        assert_eq!(store.commits(), 1);
        assert!(!store.is_writer_open());
    }

    #[test]
    fn rollback_discards_writes() {
        let store = LogStore::in_memory();
        let mut txn = store.begin().unwrap();
        txn.put("a", "1").unwrap();
        txn.rollback().unwrap();

        assert!(store.is_empty());
        assert_eq!(store.commits(), 0);
        assert_eq!(store.log_len().unwrap(), 0);
    }

    #[test]
    fn second_writer_is_busy() {
        let store = LogStore::in_memory();
        let first = store.begin().unwrap();
        assert!(matches!(store.begin(), Err(StoreError::Busy)));

        drop(first);
        assert!(store.begin().is_ok());
    }

    #[test]
    fn finished_transaction_rejects_work() {
        let store = LogStore::in_memory();
        let mut txn = store.begin().unwrap();
        txn.commit().unwrap();

        assert!(!txn.is_active());
        assert!(matches!(
            txn.put("a", "1"),
            Err(StoreError::TransactionFinished("committed"))
        ));
        assert!(txn.commit().is_err());
        assert!(txn.rollback().is_err());
    }

    #[test]
    fn reads_see_own_writes() {
        let store = LogStore::in_memory();
        let mut setup = store.begin().unwrap();
        setup.put("a", "old").unwrap();
        setup.commit().unwrap();

        let mut txn = store.begin().unwrap();
        assert_eq!(txn.get(b"a"), Some(b"old".to_vec()));
        txn.delete("a").unwrap();
        assert_eq!(txn.get(b"a"), None);
        txn.put("b", "new").unwrap();
        assert_eq!(txn.get(b"b"), Some(b"new".to_vec()));
        assert_eq!(txn.write_count(), 2);
    }

    #[test]
    fn failed_sync_rolls_back_and_truncates() {
        let backend = MemoryBackend::new();
        let store = LogStore::open(backend.clone(), StoreConfig::default()).unwrap();
        backend.fail_next_syncs(1);

        let mut txn = store.begin().unwrap();
        txn.put("a", "1").unwrap();
        assert!(matches!(txn.commit(), Err(StoreError::Injected(_))));

        assert!(store.is_empty());
        assert!(backend.data().is_empty());
        assert!(!store.is_writer_open());
    }

    #[test]
    fn reopen_replays_commits() {
        let backend = MemoryBackend::new();
        {
            let store = LogStore::open(backend.clone(), StoreConfig::default()).unwrap();
            for i in 0..3u8 {
                let mut txn = store.begin().unwrap();
                txn.put(vec![i], vec![i, i]).unwrap();
                if i == 2 {
                    txn.delete(vec![0u8]).unwrap();
                }
                txn.commit().unwrap();
            }
        }

        let store = LogStore::open(backend, StoreConfig::default()).unwrap();
        assert_eq!(store.commits(), 3);
        assert_eq!(store.keys(), vec![vec![1u8], vec![2u8]]);
        assert_eq!(store.recovery().discarded, 0);
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let backend = MemoryBackend::new();
        {
            let store = LogStore::open(backend.clone(), StoreConfig::default()).unwrap();
            let mut txn = store.begin().unwrap();
            txn.put("kept", "yes").unwrap();
            txn.commit().unwrap();
        }
        let valid = backend.data().len() as u64;
        let mut torn = backend.clone();
        torn.append(&b"OWLB\x40\x00\x00\x00partial"[..]).unwrap();

        let store = LogStore::open(backend.clone(), StoreConfig::default()).unwrap();
        let recovery = store.recovery();
        assert_eq!(recovery.batches, 1);
        assert_eq!(recovery.valid_len, valid);
        assert!(recovery.discarded > 0);
        assert_eq!(backend.data().len() as u64, valid);
        assert_eq!(store.get(b"kept"), Some(b"yes".to_vec()));
    }

    #[test]
    fn dropped_transaction_frees_writer_slot() {
        let store = LogStore::in_memory();
        {
            let mut txn = store.begin().unwrap();
            txn.put("a", "1").unwrap();
        }
        assert!(!store.is_writer_open());
        assert!(store.is_empty());
    }
}
