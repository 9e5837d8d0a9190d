//! Scoped transactions: begin, run, then commit or roll back.

use crate::error::{WriteError, WriteResult};
use onewriter_store::{Store, Transaction};
use tracing::warn;

/// Runs `work` inside a new transaction on `store`.
///
/// If `work` returns `Ok`, the transaction is committed and a commit failure
/// is returned as [`WriteError::Store`]. If it returns `Err`, the transaction
/// is rolled back and the work's error is returned as [`WriteError::Task`];
/// a failing rollback is logged but never masks that error. If `work`
/// panics, the transaction is rolled back while unwinding.
///
/// # Errors
///
/// Returns [`WriteError::Store`] if the transaction cannot be opened or
/// committed, and [`WriteError::Task`] if `work` fails.
///
/// # Example
///
/// ```rust
/// use onewriter_core::with_transaction;
/// use onewriter_store::LogStore;
///
/// let store = LogStore::in_memory();
/// with_transaction(&store, |txn| txn.put("k", "v")).unwrap();
/// assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
/// ```
pub fn with_transaction<S, T, E, F>(store: &S, work: F) -> WriteResult<T, E>
where
    S: Store + ?Sized,
    F: FnOnce(&mut S::Txn) -> Result<T, E>,
{
    let mut scope = RollbackOnDrop {
        txn: store.begin()?,
    };

    match work(&mut scope.txn) {
        Ok(value) => {
            scope.txn.commit()?;
            Ok(value)
        }
        Err(e) => {
            if scope.txn.is_active() {
                if let Err(rollback) = scope.txn.rollback() {
                    warn!(error = %rollback, "rollback after failed task also failed");
                }
            }
            Err(WriteError::Task(e))
        }
    }
}

/// Rolls back a still-active transaction when dropped.
struct RollbackOnDrop<X: Transaction> {
    txn: X,
}

impl<X: Transaction> Drop for RollbackOnDrop<X> {
    fn drop(&mut self) {
        if self.txn.is_active() {
            if let Err(e) = self.txn.rollback() {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}
