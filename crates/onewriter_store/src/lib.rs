//! # onewriter store
//!
//! The data-store side of onewriter.
//!
//! This crate provides:
//! - [`Store`] and [`Transaction`], the two traits the exclusive writer
//!   consumes
//! - [`StorageBackend`] byte stores: [`MemoryBackend`] and the file-locking
//!   [`FileBackend`]
//! - [`LogStore`], an append-log key/value store that admits exactly one
//!   write transaction at a time and answers a second one with
//!   [`StoreError::Busy`]
//!
//! ## Example
//!
//! ```rust
//! use onewriter_store::{LogStore, Store, StoreError, Transaction};
//!
//! let store = LogStore::in_memory();
//! let mut txn = store.begin().unwrap();
//! assert!(matches!(store.begin(), Err(StoreError::Busy)));
//! txn.put("k", "v").unwrap();
//! txn.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
pub mod log;
mod memory;
mod store;

pub use backend::StorageBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use log::{LogStore, LogTransaction, Recovery, StoreConfig};
pub use memory::MemoryBackend;
pub use store::{Store, Transaction};
