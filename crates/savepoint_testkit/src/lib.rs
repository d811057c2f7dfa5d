//! # Savepoint Testkit
//!
//! Test utilities for the savepoint-scoped transaction runner.
//!
//! This crate provides:
//! - Test fixtures pairing an in-memory store with a runner
//! - Property-based test generators using proptest
//! - An integration harness that checks committed state against a model
//!
//! ## Usage
//!
//! ```rust,ignore
//! use savepoint_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_runner() {
//!     with_runner(|runner, store| {
//!         runner.run_in_transaction(|tx| tx.insert("Item", item("X"))).unwrap();
//!         assert_eq!(store.count("Item"), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
