use std::io::Cursor;

use crate::consistency::Consistency;
use crate::error::Result;
use crate::frame::{FromCursor, Serialize, Version};
use crate::query::{QueryFlags, QueryValues};
use crate::types::{
    from_cursor_bytes, from_cursor_str, serialize_bytes, CInt, CIntShort, CLong, Value,
};

/// Parameters of QUERY and EXECUTE requests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    /// Consistency level.
    pub consistency: Consistency,
    /// Query values.
    pub values: Option<QueryValues>,
    /// Page size.
    pub page_size: Option<CInt>,
    /// Array of bytes which represents paging state.
    pub paging_state: Option<Vec<u8>>,
    /// Serial `Consistency`.
    pub serial_consistency: Option<Consistency>,
    /// Timestamp.
    pub timestamp: Option<CLong>,
}

impl QueryParams {
    fn flags(&self) -> QueryFlags {
        let mut flags = QueryFlags::empty();

        if let Some(values) = &self.values {
            flags.insert(QueryFlags::VALUE);
            flags.set(QueryFlags::WITH_NAMES_FOR_VALUES, values.has_names());
        }

        flags.set(QueryFlags::PAGE_SIZE, self.page_size.is_some());
        flags.set(QueryFlags::WITH_PAGING_STATE, self.paging_state.is_some());
        flags.set(
            QueryFlags::WITH_SERIAL_CONSISTENCY,
            self.serial_consistency.is_some(),
        );
        flags.set(QueryFlags::WITH_DEFAULT_TIMESTAMP, self.timestamp.is_some());

        flags
    }
}

impl Serialize for QueryParams {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>, version: Version) {
        self.consistency.serialize(cursor, version);
        self.flags().bits().serialize(cursor, version);

        if let Some(values) = &self.values {
            values.serialize(cursor, version);
        }

        if let Some(page_size) = self.page_size {
            page_size.serialize(cursor, version);
        }

        if let Some(paging_state) = &self.paging_state {
            serialize_bytes(cursor, Some(paging_state), version);
        }

        if let Some(serial_consistency) = self.serial_consistency {
            serial_consistency.serialize(cursor, version);
        }

        if let Some(timestamp) = self.timestamp {
            timestamp.serialize(cursor, version);
        }
    }
}

impl FromCursor for QueryParams {
    fn from_cursor(cursor: &mut Cursor<&[u8]>, version: Version) -> Result<QueryParams> {
        let consistency = Consistency::from_cursor(cursor, version)?;
        let flags = QueryFlags::from_bits_truncate(u8::from_cursor(cursor, version)?);

        let values = if flags.contains(QueryFlags::VALUE) {
            let count = CIntShort::from_cursor(cursor, version)?;
            let with_names = flags.contains(QueryFlags::WITH_NAMES_FOR_VALUES);

            let mut simple = Vec::new();
            let mut named = std::collections::HashMap::new();

            for _ in 0..count {
                let name = if with_names {
                    Some(from_cursor_str(cursor)?)
                } else {
                    None
                };

                let value = value_from_cursor(cursor, version)?;
                match name {
                    Some(name) => {
                        named.insert(name, value);
                    }
                    None => simple.push(value),
                }
            }

            Some(if with_names {
                QueryValues::NamedValues(named)
            } else {
                QueryValues::SimpleValues(simple)
            })
        } else {
            None
        };

        let page_size = if flags.contains(QueryFlags::PAGE_SIZE) {
            Some(CInt::from_cursor(cursor, version)?)
        } else {
            None
        };

        let paging_state = if flags.contains(QueryFlags::WITH_PAGING_STATE) {
            from_cursor_bytes(cursor)?
        } else {
            None
        };

        let serial_consistency = if flags.contains(QueryFlags::WITH_SERIAL_CONSISTENCY) {
            Some(Consistency::from_cursor(cursor, version)?)
        } else {
            None
        };

        let timestamp = if flags.contains(QueryFlags::WITH_DEFAULT_TIMESTAMP) {
            Some(CLong::from_cursor(cursor, version)?)
        } else {
            None
        };

        Ok(QueryParams {
            consistency,
            values,
            page_size,
            paging_state,
            serial_consistency,
            timestamp,
        })
    }
}

fn value_from_cursor(cursor: &mut Cursor<&[u8]>, version: Version) -> Result<Value> {
    let len = CInt::from_cursor(cursor, version)?;
    match len {
        -2 => Ok(Value::NotSet),
        len if len < 0 => Ok(Value::Null),
        len => crate::types::cursor_next_value(cursor, len as usize).map(Value::Some),
    }
}
