//! Index table: one key per record, in file order.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::Section;
use crate::dbfile::types::value::RecordKey;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexTable {
    keys: Vec<RecordKey>,
}

impl IndexTable {
    const KEY_SIZE: u32 = 4;

    /// Reads `record_count` keys from `section`, fewer when the section is too small for
    /// them; `None` when the file has no index table.
    pub fn load<R: Read + Seek>(
        reader: &mut BitReader<R>,
        section: &Section,
        record_count: u32,
    ) -> Result<Option<Self>> {
        if !section.exists {
            return Ok(None);
        }

        let capacity = section.size / Self::KEY_SIZE;
        if capacity < record_count {
            warn!(
                "Index table at {:#x} holds {} keys for {} records",
                section.start, capacity, record_count
            );
        }
        let count = record_count.min(capacity);
        debug!("Loading index table at {:#x} ({} keys)", section.start, count);
        reader.seek(section.start)?;
        let keys = (0..count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self { keys }))
    }

    /// Key of the record at `ordinal`.
    pub fn get(&self, ordinal: usize) -> Option<RecordKey> {
        self.keys.get(ordinal).copied()
    }

    pub fn keys(&self) -> &[RecordKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
