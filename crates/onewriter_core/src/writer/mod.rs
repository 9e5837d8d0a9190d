//! The exclusive writer.
//!
//! Callers on any number of threads submit work; a single worker thread runs
//! it one task at a time. The worker is started on demand and retires as soon
//! as nobody is waiting, so an idle writer owns no thread at all.
//!
//! Hand-off happens over a zero-capacity channel: `submit` blocks until the
//! worker takes the task, then blocks again until the task's result arrives.

mod task;
mod worker;

pub use task::Target;

use crate::config::WriterConfig;
use crate::context::{SharedTxn, WorkerToken, WriteContext};
use crate::error::{WriteError, WriteResult};
use crate::stats::WriterStats;
use crossbeam::channel::{self, Receiver, Sender};
use onewriter_store::Store;
use std::fmt;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use task::Task;
use tracing::error;
use worker::WorkerState;

/// Sender and receiver ends of the rendezvous queue.
struct TaskQueue<S: Store> {
    sender: Sender<Task<S>>,
    receiver: Receiver<Task<S>>,
}

/// Serializes writes against a store that tolerates one writer at a time.
///
/// At most one submitted task runs at any instant, whichever thread
/// submitted it. Each call to [`submit`](Self::submit) blocks until its own
/// task has run and returns that task's outcome.
///
/// A writer is meant to be shared, typically behind an `Arc`, for as long as
/// the store it guards.
///
/// # Example
///
/// ```rust
/// use onewriter_core::ExclusiveWriter;
/// use onewriter_store::{LogStore, MemoryBackend};
/// use std::sync::Arc;
///
/// let store = Arc::new(LogStore::in_memory());
/// let writer: ExclusiveWriter<LogStore<MemoryBackend>> = ExclusiveWriter::new();
///
/// writer
///     .submit_scoped(&store, |ctx| {
///         let txn = ctx.txn().expect("scoped tasks run in a transaction");
///         txn.put("user:1", "alice")
///     })
///     .unwrap();
///
/// assert_eq!(store.get(b"user:1"), Some(b"alice".to_vec()));
/// ```
pub struct ExclusiveWriter<S: Store> {
    queue: Option<TaskQueue<S>>,
    state: Arc<WorkerState>,
    config: WriterConfig,
}

impl<S> ExclusiveWriter<S>
where
    S: Store + 'static,
    S::Txn: 'static,
{
    /// Creates a writer with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WriterConfig::default())
    }

    /// Creates a writer whose worker threads use `config`.
    #[must_use]
    pub fn with_config(config: WriterConfig) -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            queue: Some(TaskQueue { sender, receiver }),
            state: Arc::new(WorkerState::default()),
            config,
        }
    }

    /// Creates a writer with no task queue.
    ///
    /// Every submission fails with [`WriteError::Uninitialized`] without
    /// blocking or spawning anything.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self {
            queue: None,
            state: Arc::new(WorkerState::default()),
            config: WriterConfig::default(),
        }
    }

    /// Runs `work` on the writer's worker and returns its outcome.
    ///
    /// `target` decides which transaction, if any, `work` runs against:
    ///
    /// - [`Target::Detached`]: none.
    /// - [`Target::Store`]: a new transaction, committed if `work` returns
    ///   `Ok` and rolled back otherwise.
    /// - [`Target::Transaction`]: the caller's transaction, left open.
    ///
    /// Blocks until the worker has accepted the task and again until the
    /// task has finished. Tasks are accepted in hand-off order.
    ///
    /// # Errors
    ///
    /// - [`WriteError::Task`] carries the error returned by `work`.
    /// - [`WriteError::Store`] if a scoped transaction cannot be opened or
    ///   committed.
    /// - [`WriteError::Panicked`] if `work` panicked.
    /// - [`WriteError::Uninitialized`] if the writer has no queue.
    /// - [`WriteError::Spawn`] if a worker thread was needed and could not
    ///   be started.
    pub fn submit<T, E, F>(&self, target: Target<S>, work: F) -> WriteResult<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&mut WriteContext<'_, S::Txn>) -> Result<T, E> + Send + 'static,
    {
        let Some(queue) = &self.queue else {
            self.state.stats.record_rejected();
            return Err(WriteError::Uninitialized);
        };

        // Register before looking at the flag so a retiring worker sees us.
        self.state.queued.fetch_add(1, Ordering::SeqCst);
        if !self.state.running.load(Ordering::SeqCst) {
            if let Err(e) = self.spawn_worker(queue) {
                self.state.queued.fetch_sub(1, Ordering::SeqCst);
                self.state.stats.record_rejected();
                error!(error = %e, "failed to spawn writer worker");
                return Err(WriteError::Spawn(e));
            }
        }

        let (reply, outcome) = channel::bounded(1);
        self.state.stats.record_submitted();
        if queue.sender.send(Task::new(target, work, reply)).is_err() {
            self.state.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(WriteError::WorkerLost);
        }

        outcome.recv().unwrap_or(Err(WriteError::WorkerLost))
    }

    /// Runs `work` without a transaction.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn submit_detached<T, E, F>(&self, work: F) -> WriteResult<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&mut WriteContext<'_, S::Txn>) -> Result<T, E> + Send + 'static,
    {
        self.submit(Target::Detached, work)
    }

    /// Runs `work` in a new transaction on `store`.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn submit_scoped<T, E, F>(&self, store: &Arc<S>, work: F) -> WriteResult<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&mut WriteContext<'_, S::Txn>) -> Result<T, E> + Send + 'static,
    {
        self.submit(Target::Store(Arc::clone(store)), work)
    }

    /// Runs `work` against a transaction the caller already holds.
    ///
    /// The transaction is neither committed nor rolled back.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn submit_in<T, E, F>(&self, txn: &SharedTxn<S::Txn>, work: F) -> WriteResult<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&mut WriteContext<'_, S::Txn>) -> Result<T, E> + Send + 'static,
    {
        self.submit(Target::Transaction(Arc::clone(txn)), work)
    }

    fn spawn_worker(&self, queue: &TaskQueue<S>) -> io::Result<()> {
        let state = Arc::clone(&self.state);
        let tasks = queue.receiver.clone();

        let mut builder = thread::Builder::new().name(self.config.thread_name.clone());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        self.state.threads.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = builder.spawn(move || worker::run(state, tasks)) {
            self.state.threads.fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }
}

impl<S: Store> ExclusiveWriter<S> {
    /// Checks that `token` belongs to the worker that is active right now.
    ///
    /// Returns an empty string if it does, otherwise a description of the
    /// mismatch. Meant for assertions in code that must only run inside a
    /// submitted task; it has no effect on scheduling.
    #[must_use]
    pub fn safe(&self, token: WorkerToken) -> String {
        let current = self.state.current.load(Ordering::SeqCst);
        if current == token.id() {
            String::new()
        } else {
            format!("{token} != {current}")
        }
    }

    /// Returns the writer's counters.
    pub fn stats(&self) -> &WriterStats {
        &self.state.stats
    }

    /// Returns true while a worker holds the activation claim.
    pub fn is_active(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Returns false for writers built with [`uninitialized`](Self::uninitialized).
    pub fn is_initialized(&self) -> bool {
        self.queue.is_some()
    }

    /// Returns the worker thread configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}

impl<S> Default for ExclusiveWriter<S>
where
    S: Store + 'static,
    S::Txn: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> fmt::Debug for ExclusiveWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveWriter")
            .field("initialized", &self.queue.is_some())
            .field("active", &self.is_active())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
