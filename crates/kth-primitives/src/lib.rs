/// Knuth domain - Hash primitives.
///
/// This crate provides the digests the script machine relies on:
/// - SHA-1, SHA-256 and double SHA-256
/// - RIPEMD-160 and Hash160
/// - Byte-reversed hex encoding of 32-byte hashes

pub mod hash;

mod error;
pub use error::PrimitivesError;
