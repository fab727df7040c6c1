use std::io::{Cursor, Read, Write};

use crate::error;
use crate::frame::Version;

/// Trait that should be implemented by all types that wish to be serialized to a buffer.
pub trait Serialize {
    /// Serializes given value using the cursor.
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version);

    /// Wrapper for easily starting hierarchical serialization.
    fn serialize_to_vec(&self, version: Version) -> Vec<u8> {
        let mut buf = vec![];
        self.serialize(&mut Cursor::new(&mut buf), version);
        buf
    }
}

/// `FromCursor` should be used to get parsed structure from an `io:Cursor`
/// which bound to an array of bytes.
pub trait FromCursor {
    /// Tries to parse Self from a cursor of bytes.
    fn from_cursor(cursor: &mut Cursor<&[u8]>, version: Version) -> error::Result<Self>
    where
        Self: Sized;
}

impl Serialize for &[u8] {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, _version: Version) {
        // writing into a vector cannot fail
        let _ = cursor.write_all(self);
    }
}

impl Serialize for Vec<u8> {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        self.as_slice().serialize(cursor, version)
    }
}

macro_rules! impl_serialized {
    ($t:ty) => {
        impl Serialize for $t {
            #[inline]
            fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, _version: Version) {
                let _ = cursor.write_all(&self.to_be_bytes());
            }
        }
    };
}

impl_serialized!(i8);
impl_serialized!(i16);
impl_serialized!(i32);
impl_serialized!(i64);
impl_serialized!(u8);

macro_rules! impl_from_cursor {
    ($t:ty) => {
        impl FromCursor for $t {
            #[inline]
            fn from_cursor(cursor: &mut Cursor<&[u8]>, _version: Version) -> error::Result<$t> {
                let mut buff = [0; std::mem::size_of::<$t>()];
                cursor.read_exact(&mut buff)?;
                Ok(<$t>::from_be_bytes(buff))
            }
        }
    };
}

impl_from_cursor!(i8);
impl_from_cursor!(i16);
impl_from_cursor!(i32);
impl_from_cursor!(i64);
impl_from_cursor!(u8);
