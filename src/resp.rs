//! RESP reply values and their wire encoding.

/// A reply to be written back to the client.
///
/// `Error` carries only the message text; encoding prepends the `-ERR `
/// marker. `Raw` is a preformatted RESP payload emitted verbatim (used for
/// the `COMMAND` descriptor).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RespValue {
    SimpleString(String),
    BulkString(Vec<u8>),
    Integer(i64),
    Array(Vec<RespValue>),
    Error(String),
    Raw(&'static str),
}

impl RespValue {
    /// The `+OK` reply.
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            RespValue::SimpleString(content) => format!("+{content}\r\n").into_bytes(),
            RespValue::BulkString(content) => {
                let mut encoded = format!("${}\r\n", content.len()).into_bytes();
                encoded.extend_from_slice(content);
                encoded.extend_from_slice(b"\r\n");
                encoded
            }
            RespValue::Integer(value) => format!(":{value}\r\n").into_bytes(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len()).into_bytes();
                for element in elements {
                    encoded.extend_from_slice(&element.encode());
                }
                encoded
            }
            RespValue::Error(message) => format!("-ERR {message}\r\n").into_bytes(),
            RespValue::Raw(payload) => payload.as_bytes().to_vec(),
        }
    }
}
