//! Store and transaction traits.
//!
//! These are the only things the exclusive writer knows about a data store:
//! a store can open a transaction, and a transaction can be committed or
//! rolled back. What happens in between belongs to the task.

use crate::error::StoreResult;

/// A data store that hands out write transactions.
///
/// Stores shared across threads must be `Send + Sync`. Implementations are
/// free to refuse a second concurrent transaction (see
/// [`StoreError::Busy`](crate::StoreError::Busy)); serializing callers through
/// a single writer is what avoids that refusal.
pub trait Store: Send + Sync {
    /// The transaction type produced by [`Store::begin`].
    type Txn: Transaction;

    /// Opens a new write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be opened, including when
    /// another transaction is still active.
    fn begin(&self) -> StoreResult<Self::Txn>;
}

/// An open write transaction.
///
/// # Invariants
///
/// - A transaction is active until `commit` or `rollback` is called.
/// - Finishing an already finished transaction returns
///   [`StoreError::TransactionFinished`](crate::StoreError::TransactionFinished).
pub trait Transaction: Send {
    /// Makes the transaction's writes durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the writes cannot be persisted. The transaction
    /// is finished either way.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards the transaction's writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already finished.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Returns true until the transaction is committed or rolled back.
    fn is_active(&self) -> bool;
}
