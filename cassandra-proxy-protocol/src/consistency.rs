//! Cassandra consistency levels, plus the "unset" sentinel used for requests which do not carry
//! one (e.g. PREPARE).
use derive_more::Display;
use std::io;
use std::str::FromStr;

use crate::error;
use crate::frame::{FromCursor, Serialize, Version};
use crate::types::CIntShort;

/// `Consistency` is an enum which represents Cassandra's consistency levels.
/// To find more details about each consistency level please refer to the following documentation:
/// <https://docs.datastax.com/en/cql-oss/3.x/cql/cql_reference/cqlshConsistency.html>
#[derive(Debug, PartialEq, Clone, Copy, Display, Ord, PartialOrd, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Consistency {
    Any,
    #[default]
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl FromStr for Consistency {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let consistency = match s {
            "Any" => Consistency::Any,
            "One" => Consistency::One,
            "Two" => Consistency::Two,
            "Three" => Consistency::Three,
            "Quorum" => Consistency::Quorum,
            "All" => Consistency::All,
            "LocalQuorum" => Consistency::LocalQuorum,
            "EachQuorum" => Consistency::EachQuorum,
            "Serial" => Consistency::Serial,
            "LocalSerial" => Consistency::LocalSerial,
            "LocalOne" => Consistency::LocalOne,
            _ => {
                return Err(error::Error::General(format!(
                    "Invalid consistency provided: {s}"
                )))
            }
        };

        Ok(consistency)
    }
}

impl Serialize for Consistency {
    fn serialize(&self, cursor: &mut io::Cursor<&mut Vec<u8>>, version: Version) {
        let value: CIntShort = (*self).into();
        value.serialize(cursor, version)
    }
}

impl TryFrom<CIntShort> for Consistency {
    type Error = error::Error;

    fn try_from(value: CIntShort) -> Result<Self, Self::Error> {
        match value {
            0x0000 => Ok(Consistency::Any),
            0x0001 => Ok(Consistency::One),
            0x0002 => Ok(Consistency::Two),
            0x0003 => Ok(Consistency::Three),
            0x0004 => Ok(Consistency::Quorum),
            0x0005 => Ok(Consistency::All),
            0x0006 => Ok(Consistency::LocalQuorum),
            0x0007 => Ok(Consistency::EachQuorum),
            0x0008 => Ok(Consistency::Serial),
            0x0009 => Ok(Consistency::LocalSerial),
            0x000A => Ok(Consistency::LocalOne),
            _ => Err(Self::Error::UnknownConsistency(value)),
        }
    }
}

impl From<Consistency> for CIntShort {
    fn from(value: Consistency) -> Self {
        match value {
            Consistency::Any => 0x0000,
            Consistency::One => 0x0001,
            Consistency::Two => 0x0002,
            Consistency::Three => 0x0003,
            Consistency::Quorum => 0x0004,
            Consistency::All => 0x0005,
            Consistency::LocalQuorum => 0x0006,
            Consistency::EachQuorum => 0x0007,
            Consistency::Serial => 0x0008,
            Consistency::LocalSerial => 0x0009,
            Consistency::LocalOne => 0x000A,
        }
    }
}

impl FromCursor for Consistency {
    fn from_cursor(cursor: &mut io::Cursor<&[u8]>, version: Version) -> error::Result<Consistency> {
        CIntShort::from_cursor(cursor, version).and_then(TryInto::try_into)
    }
}

/// Consistency attached to an outgoing request message. Requests without a consistency level of
/// their own are normalized to `Unset` before being sent, so that server errors can always be
/// reported together with the consistency of the failed request.
#[derive(Debug, PartialEq, Clone, Copy, Display, Ord, PartialOrd, Eq, Hash, Default)]
pub enum RequestConsistency {
    #[default]
    #[display("Unset")]
    Unset,
    #[display("{_0}")]
    Level(Consistency),
}

impl RequestConsistency {
    /// Returns the actual consistency level, if any.
    #[inline]
    pub fn level(self) -> Option<Consistency> {
        match self {
            RequestConsistency::Unset => None,
            RequestConsistency::Level(consistency) => Some(consistency),
        }
    }
}

impl From<Consistency> for RequestConsistency {
    #[inline]
    fn from(consistency: Consistency) -> Self {
        RequestConsistency::Level(consistency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_consistency_serialize() {
        assert_eq!(Consistency::Any.serialize_to_vec(Version::V4), &[0, 0]);
        assert_eq!(Consistency::Quorum.serialize_to_vec(Version::V4), &[0, 4]);
        assert_eq!(
            Consistency::LocalOne.serialize_to_vec(Version::V4),
            &[0, 10]
        );
    }

    #[test]
    fn test_consistency_from_cursor() {
        assert_eq!(
            Consistency::from_cursor(&mut Cursor::new(&[0, 6]), Version::V4).unwrap(),
            Consistency::LocalQuorum
        );
        assert!(Consistency::from_cursor(&mut Cursor::new(&[0, 11]), Version::V4).is_err());
    }

    #[test]
    fn test_consistency_from_str() {
        assert_eq!(
            "EachQuorum".parse::<Consistency>().unwrap(),
            Consistency::EachQuorum
        );
        assert!("Most".parse::<Consistency>().is_err());
    }

    #[test]
    fn should_default_request_consistency_to_unset() {
        assert_eq!(RequestConsistency::default(), RequestConsistency::Unset);
        assert_eq!(RequestConsistency::Unset.level(), None);
        assert_eq!(
            RequestConsistency::from(Consistency::All).level(),
            Some(Consistency::All)
        );
    }

    #[test]
    fn should_display_request_consistency() {
        assert_eq!(RequestConsistency::Unset.to_string(), "Unset");
        assert_eq!(
            RequestConsistency::Level(Consistency::LocalQuorum).to_string(),
            "LocalQuorum"
        );
    }
}
