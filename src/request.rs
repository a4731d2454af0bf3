//! RESP request framing.
//!
//! A request is an inline array of bulk strings: a `*N` header line, then N
//! parameters, each a `$L` header line followed by exactly L payload bytes
//! and CRLF. The first parameter is the command name; it is uppercased
//! during parsing so dispatch is case-insensitive.

use std::str;

use thiserror::Error;
use tracing::trace;

use crate::transport::{Connection, TransportError};

/// A parsed client request: the uppercased command name plus the raw byte
/// arguments that followed it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Request {
    pub command: String,
    pub arguments: Vec<Vec<u8>>,
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("request header does not start with '*'")]
    InvalidArrayHeader,
    #[error("parameter header does not start with '$'")]
    InvalidBulkHeader,
    #[error("invalid length field '{0}'")]
    InvalidLength(String),
    #[error("parameter payload is not terminated by CRLF")]
    MissingTerminator,
    #[error("request contains no command name")]
    EmptyRequest,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reads one complete request from the connection.
///
/// Any framing violation is a protocol error: the caller is expected to
/// drop the connection without replying.
pub async fn read_request(connection: &mut Connection) -> Result<Request, RequestError> {
    let header = connection.read_line().await?;
    let count = parse_count(&header, b'*')?;

    if count == 0 {
        return Err(RequestError::EmptyRequest);
    }

    let mut parameters = Vec::with_capacity(count);

    for read in 0..count {
        let header = connection.read_line().await?;
        let length = parse_count(&header, b'$')?;
        trace!(parameter = read + 1, of = count, length, "reading parameter");

        let mut payload = connection.read_exact(length + 2).await?;
        if payload[length..] != *b"\r\n" {
            return Err(RequestError::MissingTerminator);
        }
        payload.truncate(length);

        parameters.push(payload);
    }

    let command = String::from_utf8_lossy(&parameters[0]).to_uppercase();
    let arguments = parameters.split_off(1);

    Ok(Request { command, arguments })
}

/// Parses a `*N` or `$L` header line (CRLF included) into its count.
fn parse_count(line: &[u8], prefix: u8) -> Result<usize, RequestError> {
    if line.first() != Some(&prefix) {
        return Err(match prefix {
            b'*' => RequestError::InvalidArrayHeader,
            _ => RequestError::InvalidBulkHeader,
        });
    }

    let digits = &line[1..line.len() - 2];
    str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse::<usize>().ok())
        .ok_or_else(|| RequestError::InvalidLength(String::from_utf8_lossy(digits).into_owned()))
}
