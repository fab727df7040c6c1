use crate::compression::CompressionError;
use crate::consistency::RequestConsistency;
use crate::frame::message_error::ErrorBody;
use crate::frame::Opcode;
use crate::types::{CInt, CIntShort};
use std::io;
use std::net::SocketAddr;
use std::result;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Proxy driver error type. Apart from protocol and IO errors, it distinguishes configuration
/// errors, which are never retried, and server errors carrying the consistency of the request
/// that caused them.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Internal IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// General error
    #[error("General error: {0}")]
    General(String),
    /// Internal error that may be raised during `String::from_utf8`
    #[error("FromUtf8 error: {0}")]
    FromUtf8(#[from] FromUtf8Error),
    /// Internal Compression/Decompression error.
    #[error("Compressor error: {0}")]
    Compression(#[from] CompressionError),
    /// Server error.
    #[error("Server {addr} error (consistency {consistency}): {body}")]
    Server {
        body: ErrorBody,
        consistency: RequestConsistency,
        addr: SocketAddr,
    },
    /// Unknown consistency.
    #[error("Unknown consistency: {0}")]
    UnknownConsistency(CIntShort),
    /// Unknown opcode byte.
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),
    /// Unknown protocol version byte.
    #[error("Unknown protocol version: {0}")]
    UnknownVersion(u8),
    /// Expected a response opcode, got something else.
    #[error("Opcode is not a response: {0}")]
    NonResponseOpcode(Opcode),
    /// Unexpected result kind.
    #[error("Unexpected result kind: {0}")]
    UnexpectedResultKind(CInt),
}

impl Error {
    /// Checks if this error means the remote end could not be reached or dropped the connection,
    /// as opposed to a local or protocol failure.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Io(error) => matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}
