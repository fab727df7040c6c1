use derive_more::Display;
use std::io::Cursor;

use crate::error;
use crate::frame::{FromCursor, Version};
use crate::types::{from_cursor_short_bytes, from_cursor_str, CInt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ResultKind {
    Void,
    Rows,
    SetKeyspace,
    Prepared,
    SchemaChange,
}

impl TryFrom<CInt> for ResultKind {
    type Error = error::Error;

    fn try_from(value: CInt) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(ResultKind::Void),
            0x0002 => Ok(ResultKind::Rows),
            0x0003 => Ok(ResultKind::SetKeyspace),
            0x0004 => Ok(ResultKind::Prepared),
            0x0005 => Ok(ResultKind::SchemaChange),
            _ => Err(error::Error::UnexpectedResultKind(value)),
        }
    }
}

/// Body of a RESULT response. Only the kind is decoded eagerly; rows and metadata are left to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBody {
    pub kind: ResultKind,
    /// Bytes following the kind.
    pub body: Vec<u8>,
}

impl ResultBody {
    /// Keyspace name of a SET_KEYSPACE result.
    pub fn set_keyspace(&self) -> error::Result<Option<String>> {
        if self.kind != ResultKind::SetKeyspace {
            return Ok(None);
        }

        from_cursor_str(&mut Cursor::new(self.body.as_slice())).map(Some)
    }

    /// Statement id of a PREPARED result.
    pub fn prepared_id(&self) -> error::Result<Option<Vec<u8>>> {
        if self.kind != ResultKind::Prepared {
            return Ok(None);
        }

        from_cursor_short_bytes(&mut Cursor::new(self.body.as_slice())).map(Some)
    }
}

impl FromCursor for ResultBody {
    fn from_cursor(cursor: &mut Cursor<&[u8]>, version: Version) -> error::Result<ResultBody> {
        let kind = ResultKind::try_from(CInt::from_cursor(cursor, version)?)?;
        let position = cursor.position() as usize;
        let body = cursor.get_ref()[position.min(cursor.get_ref().len())..].to_vec();

        Ok(ResultBody { kind, body })
    }
}
