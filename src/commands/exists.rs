use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::storage::{Key, StorageEngine};

/// `EXISTS` is purely observational: it never mutates the store.
pub async fn exists(
    engine: &dyn StorageEngine,
    arguments: &[Vec<u8>],
) -> Result<RespValue, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("EXISTS"));
    }

    let key = Key::new(arguments[0].clone());
    let present = engine.exists(&key).await?;

    Ok(RespValue::Integer(if present { 1 } else { 0 }))
}
