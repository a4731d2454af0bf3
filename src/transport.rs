//! TCP transport with framed reads.
//!
//! A [`Connection`] owns a rolling receive buffer that accumulates bytes
//! across reads. The two read primitives consume from that buffer: by
//! delimiter (through and including the next CRLF) and by exact length.
//! When enough bytes are already buffered, a read completes without
//! touching the socket.

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;

        Ok(Connection {
            stream,
            buffer: BytesMut::with_capacity(4096),
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads bytes through and including the next CRLF.
    pub async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            if let Some(position) = self.buffer.windows(2).position(|window| window == b"\r\n") {
                return Ok(self.buffer.split_to(position + 2).to_vec());
            }

            self.fill().await?;
        }
    }

    /// Reads exactly `length` bytes.
    pub async fn read_exact(&mut self, length: usize) -> Result<Vec<u8>, TransportError> {
        while self.buffer.len() < length {
            self.fill().await?;
        }

        Ok(self.buffer.split_to(length).to_vec())
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;

        Ok(())
    }

    async fn fill(&mut self) -> Result<(), TransportError> {
        let read = self.stream.read_buf(&mut self.buffer).await?;

        if read == 0 {
            return Err(TransportError::Closed);
        }

        Ok(())
    }
}
