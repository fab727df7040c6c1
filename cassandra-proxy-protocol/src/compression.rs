//! Frame body compression, as described in the [Apache Cassandra protocol](
//! https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec#L790).
//!
//! A regular client agrees on the algorithm with the server in the STARTUP message. A proxy
//! connection never sends STARTUP: the proxy has already settled the algorithm with the backend,
//! so the client picks a fixed scheme up front and uses it for the whole connection lifetime.
use derive_more::Display;
use snap::raw::{Decoder, Encoder};
use std::io;
use std::str::FromStr;
use thiserror::Error as ThisError;

type Result<T> = std::result::Result<T, CompressionError>;

pub const LZ4: &str = "lz4";
pub const SNAPPY: &str = "snappy";

/// An error which may occur during encoding or decoding a frame body.
#[derive(Debug, ThisError)]
pub enum CompressionError {
    /// Snappy error.
    #[error("Snappy error: {0}")]
    Snappy(#[from] snap::Error),
    /// Lz4 error.
    #[error("Lz4 error: {0}")]
    Lz4(io::Error),
    /// Compression name not recognized.
    #[error("Unsupported compression: {0}")]
    Unsupported(String),
}

/// Type of frame body compression.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Ord, PartialOrd, Hash, Display, Default)]
pub enum Compression {
    /// [lz4](https://code.google.com/p/lz4/) compression
    Lz4,
    /// [snappy](https://code.google.com/p/snappy/) compression. This is what proxies usually
    /// agree on with the backend, hence the default.
    #[default]
    Snappy,
    /// Non compression
    None,
}

impl Compression {
    /// Encodes `bytes` with the selected algorithm.
    ///
    /// # Examples
    ///
    /// ```
    /// use cassandra_proxy_protocol::compression::Compression;
    ///
    /// let bytes = b"routed payload".to_vec();
    /// let encoded = Compression::Snappy.encode(&bytes).unwrap();
    /// assert_eq!(Compression::Snappy.decode(encoded).unwrap(), bytes);
    /// ```
    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match *self {
            Compression::Lz4 => encode_lz4(bytes),
            Compression::Snappy => Ok(Encoder::new().compress_vec(bytes)?),
            Compression::None => Ok(bytes.into()),
        }
    }

    /// Decodes `bytes` with the selected algorithm.
    pub fn decode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        match *self {
            Compression::Lz4 => decode_lz4(bytes),
            Compression::Snappy => Ok(Decoder::new().decompress_vec(&bytes)?),
            Compression::None => Ok(bytes),
        }
    }

    /// Checks if current compression actually compresses data.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }

    /// Protocol name of the algorithm.
    pub fn as_str(&self) -> Option<&'static str> {
        match *self {
            Compression::Lz4 => Some(LZ4),
            Compression::Snappy => Some(SNAPPY),
            Compression::None => None,
        }
    }
}

impl FromStr for Compression {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            LZ4 => Ok(Compression::Lz4),
            SNAPPY => Ok(Compression::Snappy),
            "none" | "" => Ok(Compression::None),
            other => Err(CompressionError::Unsupported(other.to_string())),
        }
    }
}

fn lz4_error<E: Into<Box<dyn std::error::Error + Send + Sync>>>(error: E) -> CompressionError {
    CompressionError::Lz4(io::Error::new(io::ErrorKind::Other, error))
}

// lz4 bodies are prefixed with the big-endian uncompressed length
fn encode_lz4(bytes: &[u8]) -> Result<Vec<u8>> {
    let len = 4 + lz4_flex::block::get_maximum_output_size(bytes.len());
    let mut result = vec![0; len];

    let uncompressed_len = i32::try_from(bytes.len()).map_err(lz4_error)?;
    result[..4].copy_from_slice(&uncompressed_len.to_be_bytes());

    let compressed_len = lz4_flex::compress_into(bytes, &mut result[4..]).map_err(lz4_error)?;

    result.truncate(4 + compressed_len);
    Ok(result)
}

fn decode_lz4(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.len() < 4 {
        return Err(lz4_error("lz4 body shorter than its length prefix"));
    }

    let uncompressed_len = i32::from_be_bytes(bytes[..4].try_into().map_err(lz4_error)?);
    let uncompressed_len = usize::try_from(uncompressed_len).map_err(lz4_error)?;

    let result = lz4_flex::decompress(&bytes[4..], uncompressed_len).map_err(lz4_error)?;
    if result.len() != uncompressed_len {
        return Err(lz4_error(format!(
            "lz4 body declared {uncompressed_len} bytes, decoded {}",
            result.len()
        )));
    }

    Ok(result)
}
