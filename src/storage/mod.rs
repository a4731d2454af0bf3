//! Storage engine contract and the byte-level key/value types.

pub mod memory;
pub mod raft;

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use async_trait::async_trait;
use thiserror::Error;

/// A key: raw bytes plus a digest precomputed over them.
///
/// The digest is derived deterministically from the byte content and is
/// used only for bucket selection. Equality is the raw byte comparison.
#[derive(Debug, Clone)]
pub struct Key {
    bytes: Vec<u8>,
    digest: u64,
}

impl Key {
    pub fn new(bytes: Vec<u8>) -> Self {
        let digest = digest(&bytes);
        Key { bytes, digest }
    }

    /// Rebuilds a key whose digest was computed elsewhere, e.g. decoded
    /// from a replicated log entry.
    pub fn with_digest(bytes: Vec<u8>, digest: u64) -> Self {
        Key { bytes, digest }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Key {}

/// 64-bit digest over key bytes.
pub fn digest(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

/// An opaque byte value. No structural interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(Vec<u8>);

impl Value {
    pub fn new(bytes: Vec<u8>) -> Self {
        Value(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum EngineError {
    #[error("key not found")]
    KeyNotFound,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("{0}")]
    Replication(String),
}

/// The uniform engine contract shared by every storage backend.
///
/// Implementations must be safe to call concurrently: connection tasks and
/// the consensus engine's apply path may touch the engine from different
/// threads.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Value, EngineError>;

    async fn set(&self, key: Key, value: Value) -> Result<(), EngineError>;

    async fn del(&self, key: &Key) -> Result<(), EngineError>;

    async fn exists(&self, key: &Key) -> Result<bool, EngineError>;

    /// Keys whose bytes match the glob `pattern`. Only `*` is a wildcard.
    async fn keys(&self, pattern: &str) -> Result<Vec<Key>, EngineError>;

    /// Every entry in the store. Ordering is unspecified.
    async fn dump(&self) -> Result<Vec<(Key, Value)>, EngineError>;
}
