use bytes::Bytes;

use crate::consistency::RequestConsistency;
use crate::frame::message_request::RequestMessage;
use crate::frame::{Flags, Frame, Serialize, Version};
use crate::types::CBytesMap;

/// Custom payload entry carrying the routing key.
pub const ROUTING_KEY_PAYLOAD: &str = "routing_key";

/// Envelope pairing a request message with the routing key the proxy uses to pick the backend
/// shard. Lives only between normalization of the message and encoding of the frame.
#[derive(Debug, PartialEq, Eq)]
pub struct ProxiedMessage<'a> {
    message: &'a RequestMessage,
    routing_key: Bytes,
}

impl<'a> ProxiedMessage<'a> {
    /// Fills in missing message fields and wraps the message. A missing consistency becomes
    /// `RequestConsistency::Unset` (on the message itself, so response handling can rely on it),
    /// a missing routing key becomes an empty one (on the envelope only).
    pub fn wrap(message: &'a mut RequestMessage) -> Self {
        if message.consistency.is_none() {
            message.consistency = Some(RequestConsistency::Unset);
        }

        let routing_key = message.routing_key.clone().unwrap_or_default();

        ProxiedMessage {
            message,
            routing_key,
        }
    }

    #[inline]
    pub fn message(&self) -> &RequestMessage {
        self.message
    }

    #[inline]
    pub fn routing_key(&self) -> &Bytes {
        &self.routing_key
    }

    /// Creates a request frame carrying the message body and the routing key in its custom
    /// payload.
    pub fn into_frame(self, version: Version, flags: Flags) -> Frame {
        let mut custom_payload = CBytesMap::with_capacity(1);
        custom_payload.insert(ROUTING_KEY_PAYLOAD.to_string(), self.routing_key.to_vec());

        Frame::new_request(
            version,
            flags,
            self.message.opcode(),
            self.message.body.serialize_to_vec(version),
        )
        .with_custom_payload(custom_payload)
    }
}

/// Extracts the routing key from a proxied frame; `None` if the frame was not proxied.
pub fn routing_key_of(frame: &Frame) -> Option<&[u8]> {
    frame
        .custom_payload
        .as_ref()
        .and_then(|payload| payload.get(ROUTING_KEY_PAYLOAD))
        .map(Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::Consistency;
    use crate::frame::message_prepare::BodyReqPrepare;
    use crate::frame::message_query::BodyReqQuery;
    use crate::frame::message_request::RequestBody;
    use crate::frame::Opcode;
    use crate::query::QueryParams;

    fn prepare_message() -> RequestMessage {
        RequestMessage::new(RequestBody::Prepare(BodyReqPrepare::new(
            "INSERT INTO ks.t (id) VALUES (?)".into(),
        )))
    }

    #[test]
    fn should_default_missing_fields() {
        let mut message = prepare_message();
        let proxied = ProxiedMessage::wrap(&mut message);

        assert_eq!(proxied.routing_key(), &Bytes::new());
        assert_eq!(
            proxied.message().consistency,
            Some(RequestConsistency::Unset)
        );
    }

    #[test]
    fn should_keep_routing_key() {
        let mut message = prepare_message().with_routing_key(&b"partition-7"[..]);
        let proxied = ProxiedMessage::wrap(&mut message);

        assert_eq!(proxied.routing_key().as_ref(), b"partition-7");
    }

    #[test]
    fn should_keep_existing_consistency() {
        let mut message = RequestMessage::new(RequestBody::Query(BodyReqQuery {
            query: "SELECT now() FROM system.local".into(),
            query_params: QueryParams {
                consistency: Consistency::LocalQuorum,
                ..Default::default()
            },
        }));

        let proxied = ProxiedMessage::wrap(&mut message);

        assert_eq!(
            proxied.message().consistency,
            Some(RequestConsistency::Level(Consistency::LocalQuorum))
        );
    }

    #[test]
    fn should_put_routing_key_into_custom_payload() {
        let mut message = prepare_message().with_routing_key(&b"pk"[..]);
        let frame = ProxiedMessage::wrap(&mut message).into_frame(Version::V4, Flags::empty());

        assert_eq!(frame.opcode, Opcode::Prepare);
        assert!(frame.flags.contains(Flags::CUSTOM_PAYLOAD));
        assert_eq!(routing_key_of(&frame), Some(&b"pk"[..]));
        assert_eq!(
            RequestBody::try_from(&frame.body, frame.opcode, frame.version).unwrap(),
            message.body
        );
    }

    #[test]
    fn should_send_empty_routing_key_explicitly() {
        let mut message = prepare_message();
        let frame = ProxiedMessage::wrap(&mut message).into_frame(Version::V4, Flags::empty());

        assert_eq!(routing_key_of(&frame), Some(&b""[..]));
    }
}
