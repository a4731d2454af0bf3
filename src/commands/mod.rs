//! Command validation and execution.
//!
//! One module per command, plus the dispatcher that routes a parsed
//! request to its handler. Handlers return either a reply value or a
//! [`CommandError`], which the dispatcher turns into an `-ERR` reply; the
//! connection stays open in both cases.

mod command_info;
mod del;
mod exists;
mod get;
mod keys;
mod set;

use std::sync::Arc;

use thiserror::Error;

use crate::request::Request;
use crate::resp::RespValue;
use crate::storage::{EngineError, StorageEngine};

pub use command_info::COMMAND_REPLY;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl CommandError {
    pub fn to_resp(&self) -> RespValue {
        RespValue::Error(self.to_string())
    }
}

/// Executes a parsed request against the engine and produces the reply.
pub async fn dispatch(engine: &Arc<dyn StorageEngine>, request: &Request) -> RespValue {
    let result = match request.command.as_str() {
        "GET" => get::get(engine.as_ref(), &request.arguments).await,
        "SET" => set::set(engine.as_ref(), &request.arguments).await,
        "DEL" => del::del(engine.as_ref(), &request.arguments).await,
        "EXISTS" => exists::exists(engine.as_ref(), &request.arguments).await,
        "KEYS" => keys::keys(engine.as_ref(), &request.arguments).await,
        "COMMAND" => command_info::command_info(),
        _ => Err(CommandError::UnknownCommand(request.command.clone())),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => e.to_resp(),
    }
}
