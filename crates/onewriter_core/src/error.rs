//! Error types for the exclusive writer.

use onewriter_store::StoreError;
use std::io;
use thiserror::Error;

/// Result type for submitted tasks: the task's own value, or why it did not
/// produce one.
pub type WriteResult<T, E> = Result<T, WriteError<E>>;

/// Errors returned by [`ExclusiveWriter::submit`](crate::ExclusiveWriter::submit).
///
/// `E` is the error type of the submitted work function. Whatever the work
/// returns is surfaced verbatim as [`WriteError::Task`].
#[derive(Debug, Error)]
pub enum WriteError<E> {
    /// The writer's task queue was never set up.
    #[error("exclusive writer not initialised")]
    Uninitialized,

    /// No worker thread could be started.
    #[error("failed to spawn writer thread: {0}")]
    Spawn(#[source] io::Error),

    /// Opening, committing or rolling back a scoped transaction failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The work function returned an error.
    #[error("task failed: {0}")]
    Task(E),

    /// The work function panicked. The worker survives and moves on.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The result slot was closed without a result.
    #[error("writer worker dropped the task without replying")]
    WorkerLost,
}

impl<E> WriteError<E> {
    /// Returns true if the work function itself failed.
    #[must_use]
    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }

    /// Returns the work function's error, if that is what this is.
    #[must_use]
    pub fn task(&self) -> Option<&E> {
        match self {
            Self::Task(e) => Some(e),
            _ => None,
        }
    }

    /// Converts into the work function's error, if that is what this is.
    pub fn into_task(self) -> Option<E> {
        match self {
            Self::Task(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the store error, if a scoped transaction failed.
    #[must_use]
    pub fn store(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_accessors() {
        let err: WriteError<&str> = WriteError::Task("boom");
        assert!(err.is_task());
        assert_eq!(err.task(), Some(&"boom"));
        assert_eq!(err.into_task(), Some("boom"));
    }

    #[test]
    fn store_errors_convert() {
        let err: WriteError<String> = StoreError::Busy.into();
        assert!(matches!(err.store(), Some(StoreError::Busy)));
        assert!(!err.is_task());
        assert_eq!(
            err.to_string(),
            "store error: store busy: another write transaction is open"
        );
    }

    #[test]
    fn display_wraps_task_error() {
        let err: WriteError<String> = WriteError::Task("disk full".into());
        assert_eq!(err.to_string(), "task failed: disk full");
        assert_eq!(
            WriteError::<String>::Uninitialized.to_string(),
            "exclusive writer not initialised"
        );
    }
}
