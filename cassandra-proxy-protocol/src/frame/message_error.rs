use derive_more::Display;
use std::io::Cursor;

use crate::error;
use crate::frame::{FromCursor, Version};
use crate::types::{from_cursor_str, CInt};

/// Body of an ERROR response. Additional, error-specific information following the message is
/// not interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("[{code:#06x}] {message}")]
pub struct ErrorBody {
    pub code: CInt,
    pub message: String,
}

impl ErrorBody {
    pub const SERVER_ERROR: CInt = 0x0000;
    pub const PROTOCOL_ERROR: CInt = 0x000A;
    pub const OVERLOADED: CInt = 0x1001;
    pub const IS_BOOTSTRAPPING: CInt = 0x1002;
    pub const UNAVAILABLE: CInt = 0x1000;
    pub const WRITE_TIMEOUT: CInt = 0x1100;
    pub const READ_TIMEOUT: CInt = 0x1200;
    pub const SYNTAX_ERROR: CInt = 0x2000;
    pub const INVALID: CInt = 0x2200;
    pub const UNPREPARED: CInt = 0x2500;

    /// Checks if the statement needs to be prepared again, e.g. after the proxy switched to a
    /// backend node which does not know it.
    #[inline]
    pub fn is_unprepared(&self) -> bool {
        self.code == Self::UNPREPARED
    }
}

impl FromCursor for ErrorBody {
    fn from_cursor(cursor: &mut Cursor<&[u8]>, version: Version) -> error::Result<ErrorBody> {
        let code = CInt::from_cursor(cursor, version)?;
        let message = from_cursor_str(cursor)?;

        Ok(ErrorBody { code, message })
    }
}
