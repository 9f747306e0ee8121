//! Copy table: key aliases replaying an already-decoded record.

use std::io::{Read, Seek};

use log::debug;

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::Section;
use crate::dbfile::types::value::RecordKey;

/// One `(new_key, old_key)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyEntry {
    pub new_key: RecordKey,
    pub old_key: RecordKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyTable {
    entries: Vec<CopyEntry>,
}

impl CopyTable {
    const ENTRY_SIZE: u32 = 8;

    /// Reads every pair up front, in file order.
    pub fn load<R: Read + Seek>(reader: &mut BitReader<R>, section: &Section) -> Result<Self> {
        if !section.exists {
            return Ok(Self::default());
        }

        let count = section.size / Self::ENTRY_SIZE;
        debug!("Loading copy table at {:#x} ({} entries)", section.start, count);
        reader.seek(section.start)?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let new_key = reader.read_u32()?;
            let old_key = reader.read_u32()?;
            entries.push(CopyEntry { new_key, old_key });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CopyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
