//! What a task sees while it runs.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A caller-owned transaction handle that can be lent to the writer.
///
/// The caller keeps a clone, submits work against it, and commits or rolls
/// back afterwards. The writer locks the handle only while the task runs,
/// when the submitting caller is blocked anyway.
pub type SharedTxn<X> = Arc<Mutex<X>>;

/// Wraps an open transaction so it can be passed to
/// [`ExclusiveWriter::submit_in`](crate::ExclusiveWriter::submit_in).
pub fn share<X>(txn: X) -> SharedTxn<X> {
    Arc::new(Mutex::new(txn))
}

/// Identifies one activation of a writer's worker.
///
/// A fresh token is minted each time a worker claims the writer, and the
/// running task receives it through [`WriteContext::token`]. Code that
/// assumes it runs inside the worker can hand the token back to
/// [`ExclusiveWriter::safe`](crate::ExclusiveWriter::safe) to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerToken(u64);

impl WorkerToken {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the activation id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The argument handed to every work function.
///
/// Carries the transaction the task runs against (if any) and the token of
/// the worker running it.
pub struct WriteContext<'a, X> {
    txn: Option<&'a mut X>,
    token: WorkerToken,
}

impl<'a, X> WriteContext<'a, X> {
    pub(crate) fn new(txn: Option<&'a mut X>, token: WorkerToken) -> Self {
        Self { txn, token }
    }

    /// Returns the transaction, or `None` for detached tasks.
    pub fn txn(&mut self) -> Option<&mut X> {
        self.txn.as_deref_mut()
    }

    /// Returns true if the task runs inside a transaction.
    #[must_use]
    pub fn has_txn(&self) -> bool {
        self.txn.is_some()
    }

    /// Returns the token of the worker running this task.
    #[must_use]
    pub fn token(&self) -> WorkerToken {
        self.token
    }
}

impl<X> fmt::Debug for WriteContext<'_, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteContext")
            .field("has_txn", &self.txn.is_some())
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_exposes_txn() {
        let mut value = 7u32;
        let mut ctx = WriteContext::new(Some(&mut value), WorkerToken::new(3));
        assert!(ctx.has_txn());
        *ctx.txn().unwrap() += 1;
        assert_eq!(ctx.token().id(), 3);
        assert_eq!(value, 8);
    }

    #[test]
    fn detached_context_has_no_txn() {
        let mut ctx: WriteContext<'_, u32> = WriteContext::new(None, WorkerToken::new(1));
        assert!(!ctx.has_txn());
        assert!(ctx.txn().is_none());
    }

    #[test]
    fn shared_txn_is_lockable() {
        let shared = share(vec![1u8]);
        shared.lock().push(2);
        assert_eq!(*shared.lock(), vec![1, 2]);
        assert_eq!(WorkerToken::new(5).to_string(), "5");
    }
}
