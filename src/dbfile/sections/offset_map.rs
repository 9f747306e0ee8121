//! Record offsets.
//!
//! Two structures share the name:
//!
//! - the on-disk offset map section of variable-record files, one
//!   `(offset: u32, length: u16)` slot per key in `min_key..=max_key`;
//! - the in-memory [`OffsetMap`], filled while the primary records are
//!   decoded and consulted afterwards by the copy-table replay.

use std::collections::HashMap;
use std::io::{Read, Seek};

use log::{debug, trace, warn};

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::Section;
use crate::dbfile::types::value::RecordKey;

/// A populated slot of the on-disk offset map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSlot {
    pub key: RecordKey,
    pub offset: u32,
    pub length: u16,
}

const SLOT_SIZE: u32 = 6;

/// Reads the offset map section, keeping only slots with a non-zero offset and length.
///
/// The slot at index `i` describes key `min_key + i`.
pub fn load_slots<R: Read + Seek>(
    reader: &mut BitReader<R>,
    section: &Section,
    min_key: i32,
) -> Result<Vec<VariableSlot>> {
    if !section.exists {
        return Ok(Vec::new());
    }

    let count = section.size / SLOT_SIZE;
    debug!("Loading offset map at {:#x} ({} slots)", section.start, count);
    reader.seek(section.start)?;

    let mut slots = Vec::new();
    for i in 0..count {
        let offset = reader.read_u32()?;
        let length = reader.read_u16()?;
        if offset == 0 || length == 0 {
            continue;
        }
        slots.push(VariableSlot {
            key: min_key.wrapping_add(i as i32) as RecordKey,
            offset,
            length,
        });
    }
    debug!("Offset map: {} populated slots", slots.len());
    Ok(slots)
}

/// Where a decoded record's bytes start, and how long they are for variable records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub start: u64,
    pub length: Option<u32>,
}

/// Key to record location, written once per key during the primary pass.
#[derive(Debug, Clone, Default)]
pub struct OffsetMap {
    locations: HashMap<RecordKey, RecordLocation>,
}

impl OffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the location of `key`. A key seen twice keeps its first location.
    pub fn insert(&mut self, key: RecordKey, location: RecordLocation) {
        if self.locations.contains_key(&key) {
            warn!("Duplicate record key {}; keeping the first location", key);
            return;
        }
        trace!("Offset map: {} -> {:#x}", key, location.start);
        self.locations.insert(key, location);
    }

    pub fn get(&self, key: RecordKey) -> Option<RecordLocation> {
        self.locations.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
