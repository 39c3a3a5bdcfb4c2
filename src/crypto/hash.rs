//! BLAKE3 content hashing
//!
//! Block hashes, transaction hashes and signing payloads are all BLAKE3
//! digests wrapped in the fixed-size `Hash` value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte content hash, compared and hashed by value
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// All-zero hash, used where a block has no parent
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(hex, &mut arr)?;
        Ok(Hash(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

/// Hash arbitrary bytes
pub fn hash_bytes(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Hash two hashes together (merkle interior node)
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&left.0);
    hasher.update(&right.0);
    Hash(*hasher.finalize().as_bytes())
}

/// Incremental hasher for the canonical encodings of transactions and blocks.
///
/// Integers are fed little-endian and variable-length sections are prefixed
/// with their element count, so distinct structures never share an encoding.
#[derive(Default)]
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(mut self, tag: &[u8]) -> Self {
        self.inner.update(&(tag.len() as u32).to_le_bytes());
        self.inner.update(tag);
        self
    }

    pub fn update_hash(&mut self, hash: &Hash) -> &mut Self {
        self.inner.update(&hash.0);
        self
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    pub fn update_u32(&mut self, value: u32) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn update_i64(&mut self, value: i64) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn update_len(&mut self, len: usize) -> &mut Self {
        self.update_u32(len as u32)
    }

    pub fn finalize(&self) -> Hash {
        Hash(*self.inner.finalize().as_bytes())
    }
}
