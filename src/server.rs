//! Server configuration and the accept loop.
//!
//! Command-line parsing is a plain flag loop over `std::env::args()`:
//! `--help`/`-h`, `--version`/`-v`, `--port`/`-p`, and `--engine` selecting
//! the storage backend. Unknown flags and engine names are rejected.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::connection::handle_client;
use crate::storage::StorageEngine;

pub const DEFAULT_PORT: u16 = 6379;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum CliError {
    #[error("missing value for flag '{0}'")]
    MissingFlagValue(String),
    #[error("invalid port number '{0}'")]
    InvalidPort(String),
    #[error("unknown engine name '{0}'")]
    UnknownEngine(String),
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),
}

/// Storage backend selected at startup.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EngineKind {
    /// Single-node in-memory hash table.
    Memory,
    /// In-memory hash table replicated through a Raft log.
    Raft,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub engine: EngineKind,
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CliAction {
    Run(ServerConfig),
    ShowHelp,
    ShowVersion,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliAction, CliError> {
    let mut iter = args.into_iter().skip(1);
    let mut port = DEFAULT_PORT;
    let mut engine = EngineKind::Memory;

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliAction::ShowHelp),
            "--version" | "-v" => return Ok(CliAction::ShowVersion),
            "--port" | "-p" => {
                let Some(value) = iter.next() else {
                    return Err(CliError::MissingFlagValue(arg));
                };
                port = parse_port(&value)?;
            }
            "--engine" => {
                let Some(value) = iter.next() else {
                    return Err(CliError::MissingFlagValue(arg));
                };
                engine = parse_engine(&value)?;
            }
            _ => return Err(CliError::UnknownFlag(arg)),
        }
    }

    Ok(CliAction::Run(ServerConfig { port, engine }))
}

fn parse_port(port: &str) -> Result<u16, CliError> {
    match port.parse::<u16>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(CliError::InvalidPort(port.to_string())),
    }
}

fn parse_engine(name: &str) -> Result<EngineKind, CliError> {
    match name {
        "memory" => Ok(EngineKind::Memory),
        "raft" => Ok(EngineKind::Raft),
        _ => Err(CliError::UnknownEngine(name.to_string())),
    }
}

pub fn usage(program: &str) -> String {
    format!(
        "usage: {program} [-hv] [--engine ENGINE] [--port PORT]\n\
         \n\
         options\n\
         \x20 --help, -h           : show this help message\n\
         \x20 --version, -v        : show version\n\
         \x20 --port PORT, -p PORT : set port number (default: 6379)\n\
         \x20 --engine ENGINE      : set storage engine (default: memory)\n\
         \n\
         storage engine\n\
         \x20 memory : use program heap memory as data storage.\n\
         \x20 raft   : replicate the memory engine across a cluster."
    )
}

/// Accepts clients on `listener` and spawns one task per connection. The
/// loop holds the engine for the listener's lifetime and only returns if
/// the listener itself fails.
pub async fn serve(listener: TcpListener, engine: Arc<dyn StorageEngine>) {
    match listener.local_addr() {
        Ok(address) => info!(%address, "listening"),
        Err(e) => error!(error = %e, "listener has no local address"),
    }

    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                let engine = Arc::clone(&engine);
                tokio::spawn(handle_client(stream, engine));
            }
            Err(e) => {
                error!(error = %e, "accept failed");
                break;
            }
        }
    }
}
