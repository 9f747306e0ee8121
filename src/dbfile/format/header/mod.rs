//! # Header Parsers
//!
//! One sibling module per container variant. Each consumes the fixed header
//! that follows the signature, plus the per-field metadata stored after it,
//! and produces a canonical [`Layout`].
//!
//! All variants start with the same four words:
//!
//! ```text
//! [4] record_count   (0 => intentionally empty file, nothing else is read)
//! [4] field_count
//! [4] record_size
//! [4] string_table_size
//! ```
//!
//! The helpers below cover that prefix and the section placement shared by
//! WDB5, WDB6 and WDC1; everything else is variant-specific.

use std::io::{Read, Seek};

use log::{debug, trace};

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::{ExtendedFieldMeta, Layout, RawFieldMeta, Section};

pub mod wdb2;
pub mod wdb5;
pub mod wdb6;
pub mod wdbc;
pub mod wdc1;

/// Outcome of a header parse.
#[derive(Debug, Clone)]
pub enum ParsedHeader {
    /// The file declares zero records; no further header fields were read.
    Empty,
    Populated(HeaderData),
}

/// Everything a header parser extracts from a populated file.
#[derive(Debug, Clone, Default)]
pub struct HeaderData {
    pub layout: Layout,
    /// `(bit_width, offset)` pairs, `field_count` of them (empty for WDBC and WDB2).
    pub raw_fields: Vec<RawFieldMeta>,
    /// WDC1 field storage info entries.
    pub extended_fields: Vec<ExtendedFieldMeta>,
}

/// The four words every variant starts with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Prefix {
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_table_size: u32,
}

/// Reads the common prefix; `None` when the record count is zero.
pub(crate) fn read_prefix<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<Option<Prefix>> {
    let record_count = reader.read_u32()?;
    if record_count == 0 {
        return Ok(None);
    }
    let prefix = Prefix {
        record_count,
        field_count: reader.read_u32()?,
        record_size: reader.read_u32()?,
        string_table_size: reader.read_u32()?,
    };
    trace!("Header prefix: {:?}", prefix);
    Ok(Some(prefix))
}

/// Reads `count` raw `(bit_width, offset)` pairs.
pub(crate) fn read_raw_fields<R: Read + Seek>(reader: &mut BitReader<R>, count: u32) -> Result<Vec<RawFieldMeta>> {
    (0..count)
        .map(|_| {
            Ok(RawFieldMeta {
                bit_width: reader.read_i16()?,
                offset: reader.read_u16()?,
            })
        })
        .collect()
}

/// Size in bytes of `count` entries of `size` bytes, rejecting sizes that overflow.
pub(crate) fn table_size(section: &'static str, start: u64, count: u32, size: u32) -> Result<u32> {
    count.checked_mul(size).ok_or(DbError::SectionOutOfBounds {
        section,
        end: start + count as u64 * size as u64,
        stream_len: start + u32::MAX as u64,
    })
}

/// Size of an offset map covering `min_key..=max_key`.
pub(crate) fn offset_map_size(start: u64, min_key: i32, max_key: i32) -> Result<u32> {
    if max_key < min_key {
        return Ok(0);
    }
    let span = max_key as i64 - min_key as i64 + 1;
    let slots = u32::try_from(span).map_err(|_| DbError::SectionOutOfBounds {
        section: "offset map",
        end: start + span as u64 * 6,
        stream_len: start + u32::MAX as u64,
    })?;
    table_size("offset map", start, slots, 6)
}

/// Sections shared by WDB5, WDB6 and WDC1, in file order.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DataSections {
    pub record_table: Section,
    pub string_pool: Section,
    pub variable_records: Section,
    pub offset_map: Section,
    pub index_table: Section,
    pub copy_table: Section,
}

/// Where the offset map lives and how large the index table is, per variant.
pub(crate) struct Placement {
    pub data_start: u64,
    pub variable: bool,
    pub offset_map_offset: u64,
    pub index_table: (bool, u32),
    pub copy_table_size: u32,
}

/// Places the record data, offset map, index table and copy table.
///
/// ```text
/// fixed records:     [records][string pool][index table][copy table]
/// variable records:  [variable records][offset map][index table][copy table]
/// ```
pub(crate) fn place_data_sections(prefix: &Prefix, min_key: i32, max_key: i32, p: Placement) -> Result<DataSections> {
    let record_bytes = table_size("record table", p.data_start, prefix.record_count, prefix.record_size)?;
    let record_table = Section::new(!p.variable, p.data_start, record_bytes);
    let string_pool = Section::new(!p.variable, record_table.end(), prefix.string_table_size);

    let variable_size = p.offset_map_offset.saturating_sub(p.data_start).min(u32::MAX as u64) as u32;
    let variable_records = Section::new(p.variable, p.data_start, variable_size);
    let offset_map = Section::new(
        p.variable,
        p.offset_map_offset,
        offset_map_size(p.offset_map_offset, min_key, max_key)?,
    );

    let data_end = if p.variable {
        offset_map.start + offset_map.size as u64
    } else {
        string_pool.start + string_pool.size as u64
    };
    let (has_index, index_size) = p.index_table;
    let index_table = Section::new(has_index, data_end, index_size);
    let copy_table = Section::new(true, index_table.next_start(), p.copy_table_size);

    debug!(
        "Data sections: records={:?} strings={:?} variable={:?} offsets={:?} index={:?} copy={:?}",
        record_table, string_pool, variable_records, offset_map, index_table, copy_table
    );
    Ok(DataSections {
        record_table,
        string_pool,
        variable_records,
        offset_map,
        index_table,
        copy_table,
    })
}

impl DataSections {
    pub(crate) fn apply(self, layout: &mut Layout) {
        layout.record_table = self.record_table;
        layout.string_pool = self.string_pool;
        layout.variable_records = self.variable_records;
        layout.offset_map = self.offset_map;
        layout.index_table = self.index_table;
        layout.copy_table = self.copy_table;
    }
}
