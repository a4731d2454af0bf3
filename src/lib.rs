//! An in-memory key/value server speaking a subset of the Redis
//! Serialization Protocol (RESP).
//!
//! Clients connect over TCP and issue `GET`, `SET`, `DEL`, `EXISTS`, `KEYS`
//! and `COMMAND`; replies are RESP-framed. Storage is pluggable behind the
//! [`storage::StorageEngine`] trait:
//!
//! - a chained-bucket in-memory hash table for single-node use, or
//! - a Raft-backed wrapper that funnels every mutation through a replicated
//!   log and applies committed entries to an inner engine on every replica.
//!
//! Reads against the Raft engine are served locally and may be stale on
//! followers; mutations are acknowledged once committed.

pub mod commands;
pub mod connection;
pub mod raft;
pub mod request;
pub mod resp;
pub mod server;
pub mod storage;
pub mod transport;
pub mod version;
