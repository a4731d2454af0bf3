//! Consensus type configuration and the log-record byte framing.

use std::io::Cursor;

use bytes::{Buf, BufMut};
use openraft::{BasicNode, TokioRuntime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Key, Value};

pub type NodeId = u64;

openraft::declare_raft_types!(
    /// Type configuration for the replicated keyspace.
    pub TypeConfig:
        D = LogRecord,
        R = LogReply,
        NodeId = NodeId,
        Node = BasicNode,
        Entry = openraft::Entry<TypeConfig>,
        SnapshotData = Cursor<Vec<u8>>,
        AsyncRuntime = TokioRuntime
);

/// Log-entry opcodes. Read commands (`GET` 1, `EXISTS` 4, `KEYS` 5) never
/// enter the log, and opcode 0 is reserved; only `SET` and `DEL` are
/// encoded.
const OP_SET: u16 = 2;
const OP_DEL: u16 = 3;

/// One replicated mutation, framed as: a 2-byte big-endian opcode; a
/// length-prefixed key block (4-byte big-endian length + bytes); the key's
/// 8-byte big-endian digest; and, for `SET`, a length-prefixed value block.
///
/// Snapshot payloads reuse the same layout: a snapshot is the
/// concatenation of `SET`-shaped records covering the whole keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    bytes: Vec<u8>,
}

impl LogRecord {
    pub fn set(key: &Key, value: &Value) -> Self {
        let mut bytes =
            Vec::with_capacity(2 + 4 + key.bytes().len() + 8 + 4 + value.bytes().len());
        bytes.put_u16(OP_SET);
        put_block(&mut bytes, key.bytes());
        bytes.put_u64(key.digest());
        put_block(&mut bytes, value.bytes());

        LogRecord { bytes }
    }

    pub fn del(key: &Key) -> Self {
        let mut bytes = Vec::with_capacity(2 + 4 + key.bytes().len() + 8);
        bytes.put_u16(OP_DEL);
        put_block(&mut bytes, key.bytes());
        bytes.put_u64(key.digest());

        LogRecord { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn decode(&self) -> Result<Mutation, RecordError> {
        let mut buf = self.bytes.as_slice();
        decode_mutation(&mut buf)
    }
}

/// A decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set { key: Key, value: Value },
    Del { key: Key },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("log record is truncated")]
    Truncated,
    #[error("unknown log opcode {0}")]
    UnknownOpcode(u16),
}

/// Decodes one mutation from the front of `buf`, advancing it past the
/// consumed record. Snapshot payloads are replayed by calling this until
/// the buffer is empty.
pub fn decode_mutation(buf: &mut &[u8]) -> Result<Mutation, RecordError> {
    if buf.remaining() < 2 {
        return Err(RecordError::Truncated);
    }

    match buf.get_u16() {
        OP_SET => {
            let key_bytes = get_block(buf)?;
            if buf.remaining() < 8 {
                return Err(RecordError::Truncated);
            }
            let digest = buf.get_u64();
            let value_bytes = get_block(buf)?;

            Ok(Mutation::Set {
                key: Key::with_digest(key_bytes, digest),
                value: Value::new(value_bytes),
            })
        }
        OP_DEL => {
            let key_bytes = get_block(buf)?;
            if buf.remaining() < 8 {
                return Err(RecordError::Truncated);
            }
            let digest = buf.get_u64();

            Ok(Mutation::Del {
                key: Key::with_digest(key_bytes, digest),
            })
        }
        other => Err(RecordError::UnknownOpcode(other)),
    }
}

fn put_block(bytes: &mut Vec<u8>, block: &[u8]) {
    bytes.put_u32(block.len() as u32);
    bytes.put_slice(block);
}

fn get_block(buf: &mut &[u8]) -> Result<Vec<u8>, RecordError> {
    if buf.remaining() < 4 {
        return Err(RecordError::Truncated);
    }

    let length = buf.get_u32() as usize;
    if buf.remaining() < length {
        return Err(RecordError::Truncated);
    }

    let mut block = vec![0u8; length];
    buf.copy_to_slice(&mut block);

    Ok(block)
}

/// Reply produced when a record is applied: the log index it committed at,
/// plus the inner engine's rejection message when there was one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogReply {
    pub log_index: u64,
    pub error: Option<String>,
}
