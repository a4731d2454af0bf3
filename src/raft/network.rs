//! TCP transport for consensus RPCs.
//!
//! Replicas exchange length-prefixed frames: a 4-byte big-endian length
//! followed by a bincode-encoded message. Each outbound RPC opens a fresh
//! connection to the target's advertised address; the peer listener
//! dispatches inbound frames into the local consensus engine.

use std::io;

use openraft::error::{
    InstallSnapshotError, NetworkError, RPCError, RaftError, RemoteError, Unreachable,
};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use openraft::{BasicNode, Raft};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, trace};

use crate::raft::types::{NodeId, TypeConfig};

/// RPCs exchanged between replicas.
#[derive(Serialize, Deserialize)]
enum PeerRequest {
    AppendEntries(AppendEntriesRequest<TypeConfig>),
    InstallSnapshot(InstallSnapshotRequest<TypeConfig>),
    Vote(VoteRequest<NodeId>),
}

#[derive(Serialize, Deserialize)]
enum PeerResponse {
    AppendEntries(Result<AppendEntriesResponse<NodeId>, RaftError<NodeId>>),
    InstallSnapshot(
        Result<InstallSnapshotResponse<NodeId>, RaftError<NodeId, InstallSnapshotError>>,
    ),
    Vote(Result<VoteResponse<NodeId>, RaftError<NodeId>>),
}

#[derive(Debug, Error)]
#[error("peer returned a mismatched response variant")]
struct ResponseMismatch;

pub struct PeerNetworkFactory;

impl RaftNetworkFactory<TypeConfig> for PeerNetworkFactory {
    type Network = PeerClient;

    async fn new_client(&mut self, target: NodeId, node: &BasicNode) -> Self::Network {
        PeerClient {
            target,
            address: node.addr.clone(),
        }
    }
}

pub struct PeerClient {
    target: NodeId,
    address: String,
}

impl PeerClient {
    async fn exchange(&self, request: &PeerRequest) -> io::Result<PeerResponse> {
        let mut stream = TcpStream::connect(&self.address).await?;

        let frame = bincode::serialize(request).map_err(invalid_data)?;
        write_frame(&mut stream, &frame).await?;

        let reply = read_frame(&mut stream).await?;
        bincode::deserialize(&reply).map_err(invalid_data)
    }
}

impl RaftNetwork<TypeConfig> for PeerClient {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>>
    {
        match self
            .exchange(&PeerRequest::AppendEntries(rpc))
            .await
            .map_err(|e| RPCError::Unreachable(Unreachable::new(&e)))?
        {
            PeerResponse::AppendEntries(Ok(response)) => Ok(response),
            PeerResponse::AppendEntries(Err(raft_error)) => {
                Err(RPCError::RemoteError(RemoteError::new(self.target, raft_error)))
            }
            _ => Err(RPCError::Network(NetworkError::new(&ResponseMismatch))),
        }
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<
        InstallSnapshotResponse<NodeId>,
        RPCError<NodeId, BasicNode, RaftError<NodeId, InstallSnapshotError>>,
    > {
        match self
            .exchange(&PeerRequest::InstallSnapshot(rpc))
            .await
            .map_err(|e| RPCError::Unreachable(Unreachable::new(&e)))?
        {
            PeerResponse::InstallSnapshot(Ok(response)) => Ok(response),
            PeerResponse::InstallSnapshot(Err(raft_error)) => {
                Err(RPCError::RemoteError(RemoteError::new(self.target, raft_error)))
            }
            _ => Err(RPCError::Network(NetworkError::new(&ResponseMismatch))),
        }
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<NodeId>,
        _option: RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        match self
            .exchange(&PeerRequest::Vote(rpc))
            .await
            .map_err(|e| RPCError::Unreachable(Unreachable::new(&e)))?
        {
            PeerResponse::Vote(Ok(response)) => Ok(response),
            PeerResponse::Vote(Err(raft_error)) => {
                Err(RPCError::RemoteError(RemoteError::new(self.target, raft_error)))
            }
            _ => Err(RPCError::Network(NetworkError::new(&ResponseMismatch))),
        }
    }
}

/// Accepts peer connections for the lifetime of the process and feeds
/// their RPCs into the local consensus engine.
pub async fn serve_peers(listener: TcpListener, raft: Raft<TypeConfig>) {
    match listener.local_addr() {
        Ok(address) => info!(%address, "consensus peer transport listening"),
        Err(e) => error!(error = %e, "peer listener has no local address"),
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let raft = raft.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_peer(stream, raft).await {
                        trace!(%peer, error = %e, "peer connection ended");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "peer accept failed");
                break;
            }
        }
    }
}

async fn handle_peer(mut stream: TcpStream, raft: Raft<TypeConfig>) -> io::Result<()> {
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        let request: PeerRequest = bincode::deserialize(&frame).map_err(invalid_data)?;

        let response = match request {
            PeerRequest::AppendEntries(rpc) => {
                PeerResponse::AppendEntries(raft.append_entries(rpc).await)
            }
            PeerRequest::InstallSnapshot(rpc) => {
                PeerResponse::InstallSnapshot(raft.install_snapshot(rpc).await)
            }
            PeerRequest::Vote(rpc) => PeerResponse::Vote(raft.vote(rpc).await),
        };

        let frame = bincode::serialize(&response).map_err(invalid_data)?;
        write_frame(&mut stream, &frame).await?;
    }
}

async fn read_frame(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let length = stream.read_u32().await? as usize;

    let mut frame = vec![0u8; length];
    stream.read_exact(&mut frame).await?;

    Ok(frame)
}

async fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
    stream.write_u32(frame.len() as u32).await?;
    stream.write_all(frame).await?;
    stream.flush().await
}

fn invalid_data(error: bincode::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}
