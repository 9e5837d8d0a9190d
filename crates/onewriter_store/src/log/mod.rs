//! Append-log key/value store.
//!
//! The reference data store for the exclusive writer: durable, simple, and
//! strictly single-writer.

mod record;
mod store;

pub use record::{compute_crc32, Batch, BatchOp, Decoded, BATCH_MAGIC, FRAME_OVERHEAD};
pub use store::{scan, LogStore, LogTransaction, Recovery, StoreConfig};
