use std::io::Cursor;

use crate::error;
use crate::frame::message_error::ErrorBody;
use crate::frame::message_result::ResultBody;
use crate::frame::{FromCursor, Opcode, Version};

/// Decoded response body. Responses to requests which a proxy connection never sends (e.g.
/// authentication challenges) are kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Error(ErrorBody),
    Ready,
    Result(ResultBody),
    Event(Vec<u8>),
    Other(Opcode, Vec<u8>),
}

impl ResponseBody {
    pub fn try_from(bytes: &[u8], response_type: Opcode, version: Version) -> error::Result<Self> {
        if !response_type.is_response() {
            return Err(error::Error::NonResponseOpcode(response_type));
        }

        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        match response_type {
            Opcode::Error => ErrorBody::from_cursor(&mut cursor, version).map(ResponseBody::Error),
            Opcode::Ready => Ok(ResponseBody::Ready),
            Opcode::Result => {
                ResultBody::from_cursor(&mut cursor, version).map(ResponseBody::Result)
            }
            Opcode::Event => Ok(ResponseBody::Event(bytes.to_vec())),
            other => Ok(ResponseBody::Other(other, bytes.to_vec())),
        }
    }

    pub fn into_error(self) -> Option<ErrorBody> {
        match self {
            ResponseBody::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<ResultBody> {
        match self {
            ResponseBody::Result(result) => Some(result),
            _ => None,
        }
    }
}
