use std::io::Cursor;

use crate::error;
use crate::frame::{FromCursor, Serialize, Version};
use crate::query::QueryParams;
use crate::types::{from_cursor_short_bytes, serialize_short_bytes};

/// Body of an EXECUTE request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BodyReqExecute {
    /// Id of the prepared statement, as returned in the PREPARED result.
    pub id: Vec<u8>,
    pub query_params: QueryParams,
}

impl Serialize for BodyReqExecute {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        serialize_short_bytes(cursor, &self.id, version);
        self.query_params.serialize(cursor, version);
    }
}

impl FromCursor for BodyReqExecute {
    fn from_cursor(cursor: &mut Cursor<&[u8]>, version: Version) -> error::Result<Self> {
        let id = from_cursor_short_bytes(cursor)?;
        let query_params = QueryParams::from_cursor(cursor, version)?;

        Ok(BodyReqExecute { id, query_params })
    }
}
