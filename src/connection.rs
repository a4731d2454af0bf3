//! Per-connection request/reply cycle.

use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{error, trace};

use crate::commands::dispatch;
use crate::request::{read_request, RequestError};
use crate::storage::StorageEngine;
use crate::transport::{Connection, TransportError};

/// Drives one client connection: read a request, dispatch it, write the
/// reply, repeat. A clean peer close ends the loop quietly; an I/O error
/// or a protocol violation ends it without a reply.
pub async fn handle_client(stream: TcpStream, engine: Arc<dyn StorageEngine>) {
    let mut connection = match Connection::new(stream) {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "failed to set up client connection");
            return;
        }
    };
    let peer = connection.peer();

    loop {
        let request = match read_request(&mut connection).await {
            Ok(request) => request,
            Err(RequestError::Transport(TransportError::Closed)) => {
                trace!(%peer, "connection closed by peer");
                return;
            }
            Err(RequestError::Transport(e)) => {
                error!(%peer, error = %e, "read failed");
                return;
            }
            Err(e) => {
                error!(%peer, error = %e, "invalid request");
                return;
            }
        };

        trace!(%peer, command = %request.command, "command received");
        let reply = dispatch(&engine, &request).await;

        if let Err(e) = connection.write_all(&reply.encode()).await {
            error!(%peer, error = %e, "write failed");
            return;
        }
    }
}
