//! Raft-replicated storage engine.
//!
//! Wraps an inner engine. Reads (`get`, `exists`, `keys`, `dump`) are
//! served locally by the inner engine with no consensus round-trip, so a
//! follower may return stale data. Mutations are framed as log records and
//! submitted to the consensus engine; they are acknowledged once committed
//! and applied, and an inner-engine rejection travels back to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use openraft::{BasicNode, Config, Raft, ServerState};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::raft::log_store::LogStore;
use crate::raft::network::{serve_peers, PeerNetworkFactory};
use crate::raft::state_machine::StateMachine;
use crate::raft::types::{LogRecord, TypeConfig};
use crate::storage::{EngineError, Key, StorageEngine, Value};

/// Port the consensus peer transport listens on.
pub const RAFT_PORT: u16 = 16379;

#[derive(Error, Debug)]
pub enum RaftEngineError {
    #[error("failed to bind the peer listener: {0}")]
    Bind(#[from] std::io::Error),
    #[error("failed to start the consensus engine: {0}")]
    Start(String),
    #[error("failed to initialize the cluster: {0}")]
    Initialize(String),
}

pub struct RaftEngine {
    raft: Raft<TypeConfig>,
    inner: Arc<dyn StorageEngine>,
}

impl RaftEngine {
    /// Starts a single-replica consensus engine around `inner`, begins
    /// serving peer RPCs on `raft_port`, and waits for leadership so that
    /// writes are accepted as soon as construction returns.
    pub async fn new(
        inner: Arc<dyn StorageEngine>,
        raft_port: u16,
    ) -> Result<Self, RaftEngineError> {
        let node_id: u64 = rand::random();
        let endpoint = format!("0.0.0.0:{raft_port}");

        let config = Config {
            heartbeat_interval: 250,
            election_timeout_min: 1000,
            election_timeout_max: 2000,
            ..Default::default()
        };
        let config = Arc::new(
            config
                .validate()
                .map_err(|e| RaftEngineError::Start(e.to_string()))?,
        );

        let log_store = LogStore::default();
        let state_machine = StateMachine::new(Arc::clone(&inner));

        let raft = Raft::new(node_id, config, PeerNetworkFactory, log_store, state_machine)
            .await
            .map_err(|e| RaftEngineError::Start(e.to_string()))?;

        let listener = TcpListener::bind(&endpoint).await?;
        tokio::spawn(serve_peers(listener, raft.clone()));

        let mut members = BTreeMap::new();
        members.insert(node_id, BasicNode::new(&endpoint));
        raft.initialize(members)
            .await
            .map_err(|e| RaftEngineError::Initialize(e.to_string()))?;

        raft.wait(Some(Duration::from_secs(10)))
            .state(ServerState::Leader, "single-replica leadership")
            .await
            .map_err(|e| RaftEngineError::Initialize(e.to_string()))?;

        info!(node_id, %endpoint, "consensus engine started");

        Ok(RaftEngine { raft, inner })
    }

    async fn replicate(&self, record: LogRecord) -> Result<(), EngineError> {
        let response = self
            .raft
            .client_write(record)
            .await
            .map_err(|e| EngineError::Replication(e.to_string()))?;

        match response.data.error {
            Some(message) => Err(EngineError::Replication(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageEngine for RaftEngine {
    async fn get(&self, key: &Key) -> Result<Value, EngineError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: Key, value: Value) -> Result<(), EngineError> {
        self.replicate(LogRecord::set(&key, &value)).await
    }

    async fn del(&self, key: &Key) -> Result<(), EngineError> {
        self.replicate(LogRecord::del(key)).await
    }

    async fn exists(&self, key: &Key) -> Result<bool, EngineError> {
        self.inner.exists(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<Key>, EngineError> {
        self.inner.keys(pattern).await
    }

    async fn dump(&self) -> Result<Vec<(Key, Value)>, EngineError> {
        self.inner.dump().await
    }
}
