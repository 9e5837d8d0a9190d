//! # onewriter core
//!
//! An exclusive write serializer for stores that tolerate a single writer.
//!
//! Any number of threads submit write tasks to an [`ExclusiveWriter`]. The
//! writer runs them one at a time on a single worker thread, which is
//! started when work arrives and retires when none is waiting. Each caller
//! blocks until its own task has run and receives that task's outcome.
//!
//! ## Execution modes
//!
//! Every task names a [`Target`]:
//!
//! - **Detached**: no transaction.
//! - **Store**: the writer opens a transaction for the task, commits it when
//!   the task succeeds and rolls it back when it fails (see
//!   [`with_transaction`]).
//! - **Transaction**: the task runs against a transaction the caller already
//!   holds ([`SharedTxn`]); the caller decides when to commit.
//!
//! ## Example
//!
//! ```rust
//! use onewriter_core::{ExclusiveWriter, WriteError};
//! use onewriter_store::{LogStore, MemoryBackend};
//! use std::sync::Arc;
//!
//! let store = Arc::new(LogStore::in_memory());
//! let writer = Arc::new(ExclusiveWriter::<LogStore<MemoryBackend>>::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let writer = Arc::clone(&writer);
//!         let store = Arc::clone(&store);
//!         std::thread::spawn(move || {
//!             writer.submit_scoped(&store, move |ctx| {
//!                 ctx.txn().unwrap().put(format!("k{i}"), "v")
//!             })
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap().unwrap();
//! }
//! assert_eq!(store.len(), 4);
//!
//! // Work errors come back verbatim.
//! let err = writer.submit_detached(|_| Err::<(), _>("nope")).unwrap_err();
//! assert!(matches!(err, WriteError::Task("nope")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod scoped;
mod stats;
mod writer;

pub use config::{WriterConfig, DEFAULT_THREAD_NAME};
pub use context::{share, SharedTxn, WorkerToken, WriteContext};
pub use error::{WriteError, WriteResult};
pub use scoped::with_transaction;
pub use stats::{StatsSnapshot, WriterStats};
pub use writer::{ExclusiveWriter, Target};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
