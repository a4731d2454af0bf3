//! Replicated state machine over a storage engine.
//!
//! Committed log records are decoded and applied to the inner engine in
//! log order on every replica. Snapshots are the whole keyspace encoded as
//! a concatenation of `SET`-shaped records; installing one replays those
//! records through the same apply path. The three most recent snapshots
//! are retained, keyed by the last log index they cover.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use openraft::storage::{RaftSnapshotBuilder, RaftStateMachine, Snapshot};
use openraft::{
    AnyError, BasicNode, Entry, EntryPayload, ErrorSubject, ErrorVerb, LogId, OptionalSend,
    SnapshotMeta, StorageError, StorageIOError, StoredMembership,
};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{error, trace};

use crate::raft::types::{decode_mutation, LogRecord, LogReply, Mutation, NodeId, TypeConfig};
use crate::storage::{EngineError, StorageEngine};

const SNAPSHOT_RETENTION: usize = 3;

/// A snapshot held in memory: its metadata plus the concatenated
/// `SET`-shaped records covering the keyspace at `meta.last_log_id`.
#[derive(Debug, Clone)]
struct StoredSnapshot {
    meta: SnapshotMeta<NodeId, BasicNode>,
    data: Vec<u8>,
}

pub struct StateMachine {
    engine: Arc<dyn StorageEngine>,
    applied: RwLock<AppliedState>,
    /// Retained snapshots keyed by the last log index they cover.
    snapshots: Mutex<BTreeMap<u64, StoredSnapshot>>,
}

#[derive(Default)]
struct AppliedState {
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<NodeId, BasicNode>,
}

impl StateMachine {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Arc<Self> {
        Arc::new(StateMachine {
            engine,
            applied: RwLock::new(AppliedState::default()),
            snapshots: Mutex::new(BTreeMap::new()),
        })
    }

    async fn apply_record(&self, record: &LogRecord) -> Option<String> {
        match record.decode() {
            Ok(mutation) => self
                .apply_mutation(mutation)
                .await
                .map(|engine_error| engine_error.to_string()),
            Err(decode_error) => {
                error!(%decode_error, "skipping undecodable log record");
                Some(decode_error.to_string())
            }
        }
    }

    async fn apply_mutation(&self, mutation: Mutation) -> Option<EngineError> {
        match mutation {
            Mutation::Set { key, value } => {
                trace!("apply committed SET");
                self.engine.set(key, value).await.err()
            }
            Mutation::Del { key } => {
                trace!("apply committed DEL");
                self.engine.del(&key).await.err()
            }
        }
    }

    /// Encodes the whole keyspace as one buffer of `SET`-shaped records.
    async fn dump_records(&self) -> Result<Vec<u8>, EngineError> {
        let entries = self.engine.dump().await?;

        let mut buffer = Vec::new();
        for (key, value) in entries {
            buffer.extend_from_slice(LogRecord::set(&key, &value).as_bytes());
        }

        Ok(buffer)
    }

    fn retain_recent_snapshots(snapshots: &mut BTreeMap<u64, StoredSnapshot>) {
        while snapshots.len() > SNAPSHOT_RETENTION {
            snapshots.pop_first();
        }
    }
}

fn snapshot_error(
    signature: Option<openraft::storage::SnapshotSignature<NodeId>>,
    verb: ErrorVerb,
    error: &dyn std::fmt::Display,
) -> StorageError<NodeId> {
    StorageIOError::new(
        ErrorSubject::Snapshot(signature),
        verb,
        AnyError::error(error.to_string()),
    )
    .into()
}

impl RaftSnapshotBuilder<TypeConfig> for Arc<StateMachine> {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TypeConfig>, StorageError<NodeId>> {
        let data = self
            .dump_records()
            .await
            .map_err(|e| snapshot_error(None, ErrorVerb::Write, &e))?;

        let applied = self.applied.read().await;
        let last_log_id = applied.last_applied;
        let last_membership = applied.last_membership.clone();
        drop(applied);

        let snapshot_id = match last_log_id {
            Some(last) => format!("{}-{}", last.leader_id, last.index),
            None => "-".to_string(),
        };
        let meta = SnapshotMeta {
            last_log_id,
            last_membership,
            snapshot_id,
        };

        trace!(snapshot_id = %meta.snapshot_id, bytes = data.len(), "snapshot created");

        let mut snapshots = self.snapshots.lock();
        snapshots.insert(
            last_log_id.map(|id| id.index).unwrap_or(0),
            StoredSnapshot {
                meta: meta.clone(),
                data: data.clone(),
            },
        );
        StateMachine::retain_recent_snapshots(&mut snapshots);
        drop(snapshots);

        Ok(Snapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

impl RaftStateMachine<TypeConfig> for Arc<StateMachine> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<LogId<NodeId>>, StoredMembership<NodeId, BasicNode>), StorageError<NodeId>>
    {
        let applied = self.applied.read().await;
        Ok((applied.last_applied, applied.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<LogReply>, StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        let mut replies = Vec::new();

        for entry in entries {
            let log_id = entry.log_id;

            let error = match entry.payload {
                EntryPayload::Blank => None,
                EntryPayload::Normal(record) => self.apply_record(&record).await,
                EntryPayload::Membership(membership) => {
                    let mut applied = self.applied.write().await;
                    applied.last_membership = StoredMembership::new(Some(log_id), membership);
                    None
                }
            };

            let mut applied = self.applied.write().await;
            applied.last_applied = Some(log_id);
            drop(applied);

            replies.push(LogReply {
                log_index: log_id.index,
                error,
            });
        }

        Ok(replies)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<NodeId, BasicNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<NodeId>> {
        trace!(snapshot_id = %meta.snapshot_id, "installing snapshot");

        let data = snapshot.into_inner();
        let mut remaining = data.as_slice();

        while !remaining.is_empty() {
            let mutation = decode_mutation(&mut remaining)
                .map_err(|e| snapshot_error(Some(meta.signature()), ErrorVerb::Read, &e))?;

            if let Some(engine_error) = self.apply_mutation(mutation).await {
                error!(%engine_error, "engine rejected a snapshot record");
            }
        }

        {
            let mut applied = self.applied.write().await;
            applied.last_applied = meta.last_log_id;
            applied.last_membership = meta.last_membership.clone();
        }

        let mut snapshots = self.snapshots.lock();
        snapshots.insert(
            meta.last_log_id.map(|id| id.index).unwrap_or(0),
            StoredSnapshot {
                meta: meta.clone(),
                data,
            },
        );
        StateMachine::retain_recent_snapshots(&mut snapshots);

        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<Snapshot<TypeConfig>>, StorageError<NodeId>> {
        let snapshots = self.snapshots.lock();

        Ok(snapshots.iter().next_back().map(|(_, stored)| Snapshot {
            meta: stored.meta.clone(),
            snapshot: Box::new(Cursor::new(stored.data.clone())),
        }))
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        self.clone()
    }
}
