use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::storage::StorageEngine;

pub async fn keys(
    engine: &dyn StorageEngine,
    arguments: &[Vec<u8>],
) -> Result<RespValue, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("KEYS"));
    }

    let pattern = String::from_utf8_lossy(&arguments[0]);
    let matches = engine.keys(&pattern).await?;

    Ok(RespValue::Array(
        matches
            .into_iter()
            .map(|key| RespValue::BulkString(key.into_bytes()))
            .collect(),
    ))
}
