//! Primitive notations of the native protocol: `[short]`, `[int]`, `[string]`, `[bytes]` and
//! the maps built from them.
use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::frame::{FromCursor, Serialize, Version};

pub const SHORT_LEN: usize = 2;
pub const INT_LEN: usize = 4;
pub const UUID_LEN: usize = 16;

pub type CInt = i32;
pub type CIntShort = i16;
pub type CLong = i64;

/// `[bytes map]` as used by custom payloads.
pub type CBytesMap = HashMap<String, Vec<u8>>;

/// A single bound value. `NotSet` leaves the column unchanged on the server (protocol v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Some(Vec<u8>),
    Null,
    NotSet,
}

impl Serialize for Value {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        match self {
            Value::Some(bytes) => serialize_bytes(cursor, Some(bytes), version),
            Value::Null => (-1 as CInt).serialize(cursor, version),
            Value::NotSet => (-2 as CInt).serialize(cursor, version),
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Some(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Some(value.to_vec())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Some(value.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Some(value.into_bytes())
    }
}

#[inline]
fn length_of(len: usize) -> CInt {
    // the protocol cannot represent anything longer anyway
    CInt::try_from(len).unwrap_or(CInt::MAX)
}

#[inline]
pub(crate) fn short_length_of(len: usize) -> CIntShort {
    // `[short]` lengths are unsigned on the wire
    u16::try_from(len).unwrap_or(u16::MAX) as CIntShort
}

/// `[string]`: a `[short]` length followed by UTF-8 bytes.
pub fn serialize_str(cursor: &mut Cursor<&mut Vec<u8>>, value: &str, version: Version) {
    short_length_of(value.len()).serialize(cursor, version);
    value.as_bytes().serialize(cursor, version);
}

/// `[long string]`: an `[int]` length followed by UTF-8 bytes.
pub fn serialize_str_long(cursor: &mut Cursor<&mut Vec<u8>>, value: &str, version: Version) {
    length_of(value.len()).serialize(cursor, version);
    value.as_bytes().serialize(cursor, version);
}

/// `[bytes]`: an `[int]` length followed by the bytes, `-1` for null.
pub fn serialize_bytes(cursor: &mut Cursor<&mut Vec<u8>>, value: Option<&[u8]>, version: Version) {
    match value {
        Some(value) => {
            length_of(value.len()).serialize(cursor, version);
            value.serialize(cursor, version);
        }
        None => (-1 as CInt).serialize(cursor, version),
    }
}

/// `[short bytes]`: a `[short]` length followed by the bytes.
pub fn serialize_short_bytes(cursor: &mut Cursor<&mut Vec<u8>>, value: &[u8], version: Version) {
    short_length_of(value.len()).serialize(cursor, version);
    value.serialize(cursor, version);
}

/// `[bytes map]`: a `[short]` count followed by `[string]` keys and `[bytes]` values.
pub fn serialize_bytes_map(cursor: &mut Cursor<&mut Vec<u8>>, map: &CBytesMap, version: Version) {
    short_length_of(map.len()).serialize(cursor, version);

    // sorted for stable encoding
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (key, value) in entries {
        serialize_str(cursor, key, version);
        serialize_bytes(cursor, Some(value), version);
    }
}

pub fn cursor_next_value(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if len > remaining {
        return Err(Error::General(format!(
            "Not enough bytes: expected {len}, {remaining} left"
        )));
    }

    let mut buff = vec![0; len];
    cursor.read_exact(&mut buff)?;
    Ok(buff)
}

fn read_len(cursor: &mut Cursor<&[u8]>, version: Version, short: bool) -> Result<i64> {
    if short {
        CIntShort::from_cursor(cursor, version).map(|len| (len as u16) as i64)
    } else {
        CInt::from_cursor(cursor, version).map(i64::from)
    }
}

pub fn from_cursor_str(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = read_len(cursor, Version::V4, true)?;
    String::from_utf8(cursor_next_value(cursor, len as usize)?).map_err(Into::into)
}

pub fn from_cursor_str_long(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = read_len(cursor, Version::V4, false)?;
    if len < 0 {
        return Err(Error::General(format!("Invalid long string length: {len}")));
    }

    String::from_utf8(cursor_next_value(cursor, len as usize)?).map_err(Into::into)
}

/// Reads `[bytes]`; negative lengths mean null.
pub fn from_cursor_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Option<Vec<u8>>> {
    let len = read_len(cursor, Version::V4, false)?;
    if len < 0 {
        return Ok(None);
    }

    cursor_next_value(cursor, len as usize).map(Some)
}

pub fn from_cursor_short_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = read_len(cursor, Version::V4, true)?;
    cursor_next_value(cursor, len as usize)
}

pub fn from_cursor_string_list(cursor: &mut Cursor<&[u8]>) -> Result<Vec<String>> {
    let len = read_len(cursor, Version::V4, true)?;
    (0..len).map(|_| from_cursor_str(cursor)).collect()
}

pub fn from_cursor_bytes_map(cursor: &mut Cursor<&[u8]>) -> Result<CBytesMap> {
    let len = read_len(cursor, Version::V4, true)?;
    (0..len)
        .map(|_| {
            let key = from_cursor_str(cursor)?;
            let value = from_cursor_bytes(cursor)?.unwrap_or_default();
            Ok((key, value))
        })
        .collect()
}
