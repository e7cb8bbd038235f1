//! Hash function primitives.
//!
//! Provides SHA-1, SHA-256, double SHA-256, RIPEMD-160 and Hash160, the
//! digests exposed by the script hashing opcodes, plus helpers to move
//! 32-byte hashes in and out of their byte-reversed display form.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::PrimitivesError;

/// Size of a SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of a RIPEMD-160 / SHA-1 digest in bytes.
pub const SHORT_HASH_SIZE: usize = 20;

/// A 32-byte digest such as a transaction id.
pub type HashDigest = [u8; HASH_SIZE];

/// A 20-byte digest.
pub type ShortHash = [u8; SHORT_HASH_SIZE];

/// Compute the SHA-1 hash of the input data.
pub fn sha1(data: &[u8]) -> ShortHash {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256 (SHA-256d) hash of the input data.
///
/// This is the hash behind transaction ids and OP_HASH256.
pub fn sha256d(data: &[u8]) -> HashDigest {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 hash of the input data.
pub fn ripemd160(data: &[u8]) -> ShortHash {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute Hash160: RIPEMD-160(SHA-256(data)).
pub fn hash160(data: &[u8]) -> ShortHash {
    ripemd160(&sha256(data))
}

/// Encode a hash in its conventional display form (byte-reversed hex).
pub fn encode_hash(hash: &HashDigest) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Decode a hash from its display form (byte-reversed hex).
///
/// # Returns
/// The hash in internal byte order, or an error if the string is not
/// 64 hex characters.
pub fn decode_hash(s: &str) -> Result<HashDigest, PrimitivesError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != HASH_SIZE {
        return Err(PrimitivesError::InvalidHashLength {
            expected: HASH_SIZE,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; HASH_SIZE];
    for (i, b) in bytes.iter().rev().enumerate() {
        out[i] = *b;
    }
    Ok(out)
}
