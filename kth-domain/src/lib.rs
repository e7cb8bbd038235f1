#![deny(missing_docs)]

//! Knuth domain.
//!
//! Re-exports the hash primitives and the script machine for convenient
//! single-crate usage.

pub use kth_primitives as primitives;
pub use kth_script as script;
