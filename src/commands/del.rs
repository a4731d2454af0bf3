use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::storage::{Key, StorageEngine};

pub async fn del(
    engine: &dyn StorageEngine,
    arguments: &[Vec<u8>],
) -> Result<RespValue, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("DEL"));
    }

    let key = Key::new(arguments[0].clone());
    engine.del(&key).await?;

    Ok(RespValue::ok())
}
