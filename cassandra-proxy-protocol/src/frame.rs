//! `frame` module contains general Frame functionality.
use bitflags::bitflags;
use derive_more::Display;
use std::io::Cursor;
use std::sync::atomic::{AtomicI16, Ordering};
use uuid::Uuid;

use crate::compression::Compression;
use crate::error;
use crate::frame::message_response::ResponseBody;
pub use crate::frame::traits::*;
use crate::types::{serialize_bytes_map, CBytesMap};

/// Number of stream bytes in accordance to protocol.
pub const STREAM_LEN: usize = 2;
/// Number of body length bytes in accordance to protocol.
pub const LENGTH_LEN: usize = 4;

pub mod message_error;
pub mod message_execute;
pub mod message_prepare;
pub mod message_proxied;
pub mod message_query;
pub mod message_request;
pub mod message_response;
pub mod message_result;
pub mod traits;

const INITIAL_STREAM_ID: i16 = 1;
pub const EVENT_STREAM_ID: i16 = -1;

static STREAM_ID: AtomicI16 = AtomicI16::new(INITIAL_STREAM_ID);

pub type StreamId = i16;

// negative ids are reserved for server events
fn next_stream_id() -> StreamId {
    STREAM_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |stream| {
            Some(if stream == StreamId::MAX {
                INITIAL_STREAM_ID
            } else {
                stream + 1
            })
        })
        .unwrap_or(INITIAL_STREAM_ID)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: Version,
    pub direction: Direction,
    pub flags: Flags,
    pub opcode: Opcode,
    pub stream: StreamId,
    pub body: Vec<u8>,
    pub tracing_id: Option<Uuid>,
    pub warnings: Vec<String>,
    /// Custom payload; written before the body and flagged with `CUSTOM_PAYLOAD` when present.
    pub custom_payload: Option<CBytesMap>,
}

impl Frame {
    /// Creates a new request frame with the next free stream id.
    pub fn new_request(version: Version, flags: Flags, opcode: Opcode, body: Vec<u8>) -> Self {
        Frame {
            version,
            direction: Direction::Request,
            flags,
            opcode,
            stream: next_stream_id(),
            body,
            tracing_id: None,
            warnings: vec![],
            custom_payload: None,
        }
    }

    /// Attaches a custom payload to this frame.
    pub fn with_custom_payload(mut self, custom_payload: CBytesMap) -> Self {
        self.flags.insert(Flags::CUSTOM_PAYLOAD);
        self.custom_payload = Some(custom_payload);
        self
    }

    pub fn response_body(&self) -> error::Result<ResponseBody> {
        ResponseBody::try_from(self.body.as_slice(), self.opcode, self.version)
    }

    #[inline]
    pub fn tracing_id(&self) -> &Option<Uuid> {
        &self.tracing_id
    }

    #[inline]
    pub fn warnings(&self) -> &Vec<String> {
        &self.warnings
    }

    pub fn encode_with(&self, compressor: Compression) -> error::Result<Vec<u8>> {
        let mut flags = self.flags;
        flags.set(Flags::COMPRESSION, compressor.is_compressed());
        flags.set(Flags::CUSTOM_PAYLOAD, self.custom_payload.is_some());

        let combined_version_byte = u8::from(self.version) | u8::from(self.direction);
        let opcode_byte = u8::from(self.opcode);

        let mut full_body = Vec::with_capacity(self.body.len());
        if let Some(custom_payload) = &self.custom_payload {
            serialize_bytes_map(&mut Cursor::new(&mut full_body), custom_payload, self.version);
        }

        full_body.extend_from_slice(&self.body);

        let full_body = compressor.encode(&full_body)?;

        let mut v = Vec::with_capacity(9 + full_body.len());

        v.push(combined_version_byte);
        v.push(flags.bits());
        v.extend_from_slice(&self.stream.to_be_bytes());
        v.push(opcode_byte);
        let body_len = i32::try_from(full_body.len()).map_err(|_| {
            error::Error::General(format!("Frame body too long: {} bytes", full_body.len()))
        })?;
        v.extend_from_slice(&body_len.to_be_bytes());
        v.extend_from_slice(&full_body);

        Ok(v)
    }
}

/// Protocol version. Custom payloads, which carry routing information for the proxy, were
/// introduced in v4.
#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display, Default)]
pub enum Version {
    V3,
    #[default]
    V4,
}

impl From<Version> for u8 {
    fn from(value: Version) -> Self {
        match value {
            Version::V3 => 3,
            Version::V4 => 4,
        }
    }
}

impl TryFrom<u8> for Version {
    type Error = error::Error;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version & 0x7F {
            3 => Ok(Version::V3),
            4 => Ok(Version::V4),
            v => Err(error::Error::UnknownVersion(v)),
        }
    }
}

impl Version {
    /// Number of bytes that represent Cassandra frame's version.
    pub const BYTE_LENGTH: usize = 1;

    /// Checks if frames of this version can carry a custom payload.
    #[inline]
    pub fn supports_custom_payload(self) -> bool {
        self >= Version::V4
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Direction {
    Request,
    Response,
}

impl From<Direction> for u8 {
    fn from(value: Direction) -> u8 {
        match value {
            Direction::Request => 0x00,
            Direction::Response => 0x80,
        }
    }
}

impl From<u8> for Direction {
    fn from(value: u8) -> Self {
        match value & 0x80 {
            0 => Direction::Request,
            _ => Direction::Response,
        }
    }
}

bitflags! {
    /// Frame flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Flags: u8 {
        const COMPRESSION = 0x01;
        const TRACING = 0x02;
        const CUSTOM_PAYLOAD = 0x04;
        const WARNING = 0x08;
        const BETA = 0x10;
    }
}

impl Flags {
    /// Number of bytes that represent Cassandra frame's flags.
    pub const BYTE_LENGTH: usize = 1;
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Opcode {
    Error,
    Startup,
    Ready,
    Authenticate,
    Options,
    Supported,
    Query,
    Result,
    Prepare,
    Execute,
    Register,
    Event,
    Batch,
    AuthChallenge,
    AuthResponse,
    AuthSuccess,
}

impl Opcode {
    /// Number of bytes that represent Cassandra frame's opcode.
    pub const BYTE_LENGTH: usize = 1;

    /// Checks if this opcode is sent by servers.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Opcode::Error
                | Opcode::Ready
                | Opcode::Authenticate
                | Opcode::Supported
                | Opcode::Result
                | Opcode::Event
                | Opcode::AuthChallenge
                | Opcode::AuthSuccess
        )
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Error => 0x00,
            Opcode::Startup => 0x01,
            Opcode::Ready => 0x02,
            Opcode::Authenticate => 0x03,
            Opcode::Options => 0x05,
            Opcode::Supported => 0x06,
            Opcode::Query => 0x07,
            Opcode::Result => 0x08,
            Opcode::Prepare => 0x09,
            Opcode::Execute => 0x0A,
            Opcode::Register => 0x0B,
            Opcode::Event => 0x0C,
            Opcode::Batch => 0x0D,
            Opcode::AuthChallenge => 0x0E,
            Opcode::AuthResponse => 0x0F,
            Opcode::AuthSuccess => 0x10,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = error::Error;

    fn try_from(value: u8) -> Result<Self, <Opcode as TryFrom<u8>>::Error> {
        match value {
            0x00 => Ok(Opcode::Error),
            0x01 => Ok(Opcode::Startup),
            0x02 => Ok(Opcode::Ready),
            0x03 => Ok(Opcode::Authenticate),
            0x05 => Ok(Opcode::Options),
            0x06 => Ok(Opcode::Supported),
            0x07 => Ok(Opcode::Query),
            0x08 => Ok(Opcode::Result),
            0x09 => Ok(Opcode::Prepare),
            0x0A => Ok(Opcode::Execute),
            0x0B => Ok(Opcode::Register),
            0x0C => Ok(Opcode::Event),
            0x0D => Ok(Opcode::Batch),
            0x0E => Ok(Opcode::AuthChallenge),
            0x0F => Ok(Opcode::AuthResponse),
            0x10 => Ok(Opcode::AuthSuccess),
            _ => Err(error::Error::UnknownOpcode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn should_encode_header() {
        let mut frame = Frame::new_request(Version::V4, Flags::empty(), Opcode::Prepare, vec![1]);
        frame.stream = 7;

        let encoded = frame.encode_with(Compression::None).unwrap();

        assert_eq!(encoded, vec![0x04, 0x00, 0x00, 0x07, 0x09, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn should_prepend_custom_payload_and_flag_it() {
        let mut frame = Frame::new_request(Version::V4, Flags::empty(), Opcode::Query, vec![9])
            .with_custom_payload(hashmap! { "k".to_string() => vec![] });
        frame.stream = 1;

        let encoded = frame.encode_with(Compression::None).unwrap();

        assert_eq!(encoded[1], Flags::CUSTOM_PAYLOAD.bits());
        // count, key length, key, value length, value, body
        assert_eq!(&encoded[9..], &[0, 1, 0, 1, b'k', 0, 0, 0, 0, 9]);
    }

    #[test]
    fn should_flag_compressed_body() {
        let frame = Frame::new_request(Version::V4, Flags::empty(), Opcode::Query, vec![1, 2, 3]);
        let encoded = frame.encode_with(Compression::Snappy).unwrap();

        assert!(Flags::from_bits_truncate(encoded[1]).contains(Flags::COMPRESSION));
        assert_eq!(
            Compression::Snappy.decode(encoded[9..].to_vec()).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn should_wrap_stream_ids_to_positive() {
        STREAM_ID.store(i16::MAX - 2, Ordering::SeqCst);

        let ids: Vec<_> = (0..6).map(|_| next_stream_id()).collect();

        assert!(ids.iter().all(|id| *id > 0), "{ids:?}");
        assert!(ids.iter().any(|id| *id < i16::MAX - 2), "{ids:?}");
    }

    #[test]
    fn should_reject_unknown_opcode() {
        assert!(Opcode::try_from(0x04).is_err());
        assert_eq!(Opcode::try_from(0x0A).unwrap(), Opcode::Execute);
    }

    #[test]
    fn should_parse_version_with_direction() {
        assert_eq!(Version::try_from(0x84).unwrap(), Version::V4);
        assert_eq!(Direction::from(0x84), Direction::Response);
        assert!(Version::try_from(0x05).is_err());
        assert!(!Version::V3.supports_custom_payload());
    }
}
