use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::storage::{Key, StorageEngine, Value};

pub async fn set(
    engine: &dyn StorageEngine,
    arguments: &[Vec<u8>],
) -> Result<RespValue, CommandError> {
    if arguments.len() != 2 {
        return Err(CommandError::WrongArity("SET"));
    }

    let key = Key::new(arguments[0].clone());
    let value = Value::new(arguments[1].clone());
    engine.set(key, value).await?;

    Ok(RespValue::ok())
}
