//! # onewriter testkit
//!
//! Test utilities for onewriter.
//!
//! This crate provides:
//! - Store fixtures paired with a writer
//! - Property-based task-plan generators using proptest
//! - A harness that runs plans and verifies the committed state
//! - Stress runners and an interval recorder for exclusion checks
//!
//! ## Usage
//!
//! ```rust
//! use onewriter_testkit::prelude::*;
//!
//! let fixture = TestStore::memory();
//! let config = StressConfig {
//!     threads: 2,
//!     tasks_per_thread: 10,
//!     ..Default::default()
//! };
//! let result = stress_scoped_writes(&fixture.store, &fixture.writer, &config);
//! assert_eq!(result.busy_errors, 0);
//! assert_eq!(result.overlaps, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
