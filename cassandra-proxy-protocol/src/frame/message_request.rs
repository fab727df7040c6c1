use bytes::Bytes;
use std::io::Cursor;

use crate::consistency::{Consistency, RequestConsistency};
use crate::error;
use crate::frame::message_execute::BodyReqExecute;
use crate::frame::message_prepare::BodyReqPrepare;
use crate::frame::message_query::BodyReqQuery;
use crate::frame::{FromCursor, Opcode, Serialize, Version};

/// Request bodies which can be routed through a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Query(BodyReqQuery),
    Prepare(BodyReqPrepare),
    Execute(BodyReqExecute),
}

impl RequestBody {
    pub fn opcode(&self) -> Opcode {
        match self {
            RequestBody::Query(_) => Opcode::Query,
            RequestBody::Prepare(_) => Opcode::Prepare,
            RequestBody::Execute(_) => Opcode::Execute,
        }
    }

    /// Consistency carried by the body itself, if the request type has one.
    pub fn consistency(&self) -> Option<Consistency> {
        match self {
            RequestBody::Query(query) => Some(query.query_params.consistency),
            RequestBody::Execute(execute) => Some(execute.query_params.consistency),
            RequestBody::Prepare(_) => None,
        }
    }

    pub fn try_from(bytes: &[u8], opcode: Opcode, version: Version) -> error::Result<RequestBody> {
        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        match opcode {
            Opcode::Query => {
                BodyReqQuery::from_cursor(&mut cursor, version).map(RequestBody::Query)
            }
            Opcode::Prepare => {
                BodyReqPrepare::from_cursor(&mut cursor, version).map(RequestBody::Prepare)
            }
            Opcode::Execute => {
                BodyReqExecute::from_cursor(&mut cursor, version).map(RequestBody::Execute)
            }
            _ => Err(error::Error::General(format!(
                "Unsupported request opcode: {opcode}"
            ))),
        }
    }
}

impl Serialize for RequestBody {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        match self {
            RequestBody::Query(body) => body.serialize(cursor, version),
            RequestBody::Prepare(body) => body.serialize(cursor, version),
            RequestBody::Execute(body) => body.serialize(cursor, version),
        }
    }
}

/// An outgoing request, as produced by the query layer. Both attributes are optional and
/// independently settable; a message reaching the wire through a proxy connection has both of
/// them filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub body: RequestBody,
    /// Consistency reported together with server errors for this request. Independent of the
    /// consistency serialized inside the body.
    pub consistency: Option<RequestConsistency>,
    /// Key of the partition targeted by this request, used by the proxy to pick a shard.
    pub routing_key: Option<Bytes>,
}

impl RequestMessage {
    /// Creates a message with the consistency taken from the body, if it has one, and no routing
    /// key.
    pub fn new(body: RequestBody) -> Self {
        let consistency = body.consistency().map(RequestConsistency::Level);
        RequestMessage {
            body,
            consistency,
            routing_key: None,
        }
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<Bytes>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.body.opcode()
    }
}

impl From<RequestBody> for RequestMessage {
    #[inline]
    fn from(body: RequestBody) -> Self {
        RequestMessage::new(body)
    }
}
