use crate::commands::CommandError;
use crate::resp::RespValue;

/// Fixed reply advertising the supported commands: an array of
/// `[name, arity, [flags], first_key, last_key, step, [categories]]`
/// descriptors. Arguments to `COMMAND` (e.g. `COMMAND DOCS`) are ignored.
pub const COMMAND_REPLY: &str = "*5\r\n\
    *7\r\n$3\r\nget\r\n:1\r\n*1\r\n+readonly\r\n:1\r\n:1\r\n:0\r\n*0\r\n\
    *7\r\n$3\r\nset\r\n:2\r\n*2\r\n+write\r\n+denyoom\r\n:1\r\n:1\r\n:0\r\n*0\r\n\
    *7\r\n$6\r\nexists\r\n:1\r\n*1\r\n+readonly\r\n:1\r\n:1\r\n:0\r\n*0\r\n\
    *7\r\n$3\r\ndel\r\n:1\r\n*1\r\n+write\r\n:1\r\n:1\r\n:0\r\n*0\r\n\
    *7\r\n$4\r\nkeys\r\n:1\r\n*1\r\n+readonly\r\n:0\r\n:0\r\n:0\r\n*0\r\n";

pub fn command_info() -> Result<RespValue, CommandError> {
    Ok(RespValue::Raw(COMMAND_REPLY))
}
