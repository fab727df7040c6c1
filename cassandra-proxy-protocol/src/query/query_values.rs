use std::collections::HashMap;
use std::io::Cursor;

use crate::frame::{Serialize, Version};
use crate::types::{serialize_str, short_length_of, Value};

/// Values bound to a query, either by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValues {
    SimpleValues(Vec<Value>),
    NamedValues(HashMap<String, Value>),
}

impl QueryValues {
    #[inline]
    pub fn has_names(&self) -> bool {
        matches!(self, QueryValues::NamedValues(_))
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            QueryValues::SimpleValues(values) => values.len(),
            QueryValues::NamedValues(values) => values.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Into<Value>> From<Vec<T>> for QueryValues {
    fn from(values: Vec<T>) -> Self {
        QueryValues::SimpleValues(values.into_iter().map(Into::into).collect())
    }
}

impl Serialize for QueryValues {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        short_length_of(self.len()).serialize(cursor, version);

        match self {
            QueryValues::SimpleValues(values) => {
                for value in values {
                    value.serialize(cursor, version);
                }
            }
            QueryValues::NamedValues(values) => {
                for (name, value) in values {
                    serialize_str(cursor, name, version);
                    value.serialize(cursor, version);
                }
            }
        }
    }
}
