//! Units of work travelling from submitters to the worker.

use crate::context::{SharedTxn, WorkerToken, WriteContext};
use crate::error::{WriteError, WriteResult};
use crate::scoped::with_transaction;
use crate::stats::WriterStats;
use crossbeam::channel::Sender;
use onewriter_store::Store;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// Where a task's work runs.
pub enum Target<S: Store> {
    /// No transaction. The work receives a context without one.
    Detached,
    /// A fresh transaction opened on the store, committed if the work
    /// succeeds and rolled back otherwise.
    Store(Arc<S>),
    /// A transaction the caller already holds. The writer never commits or
    /// rolls it back.
    Transaction(SharedTxn<S::Txn>),
}

impl<S: Store> Target<S> {
    /// Short name of the variant, for logs and reports.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Store(_) => "scoped",
            Self::Transaction(_) => "caller-txn",
        }
    }
}

impl<S: Store> Clone for Target<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Detached => Self::Detached,
            Self::Store(store) => Self::Store(Arc::clone(store)),
            Self::Transaction(txn) => Self::Transaction(Arc::clone(txn)),
        }
    }
}

impl<S: Store> fmt::Debug for Target<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target::{}", self.mode())
    }
}

/// Type-erased work plus its reply slot.
pub(crate) type Job<S> = Box<dyn FnOnce(Target<S>, WorkerToken, &WriterStats) + Send>;

/// One queued unit of work.
pub(crate) struct Task<S: Store> {
    target: Target<S>,
    job: Job<S>,
}

impl<S: Store> Task<S> {
    /// Packages `work` so that running it delivers exactly one result on
    /// `reply` and then closes the slot.
    pub(crate) fn new<T, E, F>(
        target: Target<S>,
        work: F,
        reply: Sender<WriteResult<T, E>>,
    ) -> Self
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&mut WriteContext<'_, S::Txn>) -> Result<T, E> + Send + 'static,
    {
        let job: Job<S> = Box::new(move |target, token, stats| {
            let result = match catch_unwind(AssertUnwindSafe(|| execute(target, token, work))) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(%token, panic = %message, "write task panicked");
                    Err(WriteError::Panicked(message))
                }
            };

            match &result {
                Ok(_) => stats.record_succeeded(),
                Err(WriteError::Panicked(_)) => stats.record_panicked(),
                Err(_) => stats.record_failed(),
            }

            // The submitter is blocked on the other end until this lands.
            if reply.send(result).is_err() {
                trace!(%token, "submitter went away before the result arrived");
            }
        });

        Self { target, job }
    }

    /// Runs the task on the worker identified by `token`.
    pub(crate) fn run(self, token: WorkerToken, stats: &WriterStats) {
        trace!(%token, mode = self.target.mode(), "running write task");
        (self.job)(self.target, token, stats);
    }
}

fn execute<S, T, E, F>(target: Target<S>, token: WorkerToken, work: F) -> WriteResult<T, E>
where
    S: Store,
    F: FnOnce(&mut WriteContext<'_, S::Txn>) -> Result<T, E>,
{
    match target {
        Target::Detached => work(&mut WriteContext::new(None, token)).map_err(WriteError::Task),
        Target::Store(store) => {
            with_transaction(&*store, |txn| work(&mut WriteContext::new(Some(txn), token)))
        }
        Target::Transaction(shared) => {
            let mut txn = shared.lock();
            work(&mut WriteContext::new(Some(&mut *txn), token)).map_err(WriteError::Task)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use onewriter_store::{LogStore, MemoryBackend, Transaction};

    type Mem = LogStore<MemoryBackend>;

    fn run_one<T, E, F>(target: Target<Mem>, work: F) -> (WriteResult<T, E>, WriterStats)
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&mut WriteContext<'_, <Mem as Store>::Txn>) -> Result<T, E> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let stats = WriterStats::new();
        Task::new(target, work, tx).run(WorkerToken::new(1), &stats);
        (rx.recv().unwrap(), stats)
    }

    #[test]
    fn detached_gets_no_txn() {
        let (result, stats) = run_one(Target::Detached, |ctx| Ok::<_, String>(ctx.has_txn()));
        assert!(!result.unwrap());
        assert_eq!(stats.succeeded(), 1);
    }

    #[test]
    fn scoped_commits() {
        let store = Arc::new(Mem::in_memory());
        let (result, _) = run_one(Target::Store(Arc::clone(&store)), |ctx| {
            ctx.txn().unwrap().put("k", "v")
        });
        result.unwrap();
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn caller_txn_is_left_open() {
        let store = Mem::in_memory();
        let shared = crate::share(store.begin().unwrap());
        let (result, _) = run_one(Target::Transaction(Arc::clone(&shared)), |ctx| {
            ctx.txn().unwrap().put("k", "v")
        });
        result.unwrap();

        assert!(shared.lock().is_active());
        assert!(store.get(b"k").is_none());
        shared.lock().commit().unwrap();
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn panic_is_reported() {
        let (result, stats) = run_one(Target::Detached, |_| -> Result<(), String> {
            panic!("boom");
        });
        assert!(matches!(result, Err(WriteError::Panicked(ref m)) if m == "boom"));
        assert_eq!(stats.panicked(), 1);
        assert_eq!(stats.failed(), 0);
    }

    #[test]
    fn failure_is_counted() {
        let (result, stats) = run_one(Target::Detached, |_| Err::<(), _>("bad"));
        assert!(matches!(result, Err(WriteError::Task("bad"))));
        assert_eq!(stats.failed(), 1);
    }

    #[test]
    fn panic_message_formats() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
