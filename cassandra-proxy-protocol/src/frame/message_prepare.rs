use std::io::Cursor;

use crate::error;
use crate::frame::{FromCursor, Serialize, Version};
use crate::types::{from_cursor_str_long, serialize_str_long};

/// Body of a PREPARE request. It carries no consistency level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BodyReqPrepare {
    pub query: String,
}

impl BodyReqPrepare {
    #[inline]
    pub fn new(query: String) -> Self {
        BodyReqPrepare { query }
    }
}

impl Serialize for BodyReqPrepare {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        serialize_str_long(cursor, &self.query, version);
    }
}

impl FromCursor for BodyReqPrepare {
    fn from_cursor(cursor: &mut Cursor<&[u8]>, _version: Version) -> error::Result<Self> {
        from_cursor_str_long(cursor).map(BodyReqPrepare::new)
    }
}
