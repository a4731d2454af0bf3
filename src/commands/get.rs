use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::storage::{Key, StorageEngine};

pub async fn get(
    engine: &dyn StorageEngine,
    arguments: &[Vec<u8>],
) -> Result<RespValue, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("GET"));
    }

    let key = Key::new(arguments[0].clone());
    let value = engine.get(&key).await?;

    Ok(RespValue::BulkString(value.into_bytes()))
}
