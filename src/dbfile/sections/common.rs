//! Common-data table: sparse per-field overrides keyed by record key.
//!
//! Fields stored as common data are absent from the record bytes. Each such
//! field owns a list of `(key, value)` pairs; a key missing from the list
//! takes the field's default.
//!
//! Two on-disk layouts exist:
//!
//! ```text
//! WDB6:  column_count: u32
//!        per column: count: u32, type: u8, count × (key: u32, value)
//!                    value width by type: 1 -> 2, 2 -> 1, 3 -> 4 (float), 4 -> 4
//!
//! WDC1:  per common-data field, the byte range
//!        [start + additional_data_offset, + additional_data_size)
//!        of (key: u32, value) pairs, value width = member element width
//! ```
//!
//! WDB6 values are packed at their type width. WDC1 applies a padding sniff
//! after a value narrower than 4 bytes: if the next stream byte is `0x00`, the
//! value is taken to be padded and `4 - width` bytes are skipped. The
//! heuristic is fragile but files rely on the exact byte consumption it
//! produces.
//!
//! Entry counts come from the file and are checked against the section
//! before anything is reserved.

use std::collections::HashMap;
use std::io::{Read, Seek};

use log::{debug, trace, warn};

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::{CompressionKind, FieldDescriptor, Section};
use crate::dbfile::types::schema::Schema;
use crate::dbfile::types::value::RecordKey;
use crate::dbfile::utils;

#[derive(Debug, Clone, Default)]
pub struct CommonDataTable {
    /// Field index (schema member order) to key/raw value pairs.
    columns: HashMap<usize, HashMap<RecordKey, u64>>,
}

impl CommonDataTable {
    /// Raw stored value of `field` for `key`, if the table overrides it.
    pub fn lookup(&self, field: usize, key: RecordKey) -> Option<u64> {
        self.columns.get(&field)?.get(&key).copied()
    }

    /// Number of fields with a loaded column.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Loads the WDB6 layout. Column `i` belongs to the `i`-th field stored in the file.
    pub fn load_wdb6<R: Read + Seek>(
        reader: &mut BitReader<R>,
        section: &Section,
        fields: &[FieldDescriptor],
    ) -> Result<Self> {
        let mut table = Self::default();
        if !section.exists {
            return Ok(table);
        }

        reader.seek(section.start)?;
        let column_count = reader.read_u32()?;
        debug!("Loading WDB6 common data at {:#x} ({} columns)", section.start, column_count);

        // Fields in file order: the key member backed by an index table has no column.
        let file_fields: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.from_index_table)
            .map(|(i, _)| i)
            .collect();

        let end = section.end();
        for column in 0..column_count as usize {
            ensure_room(reader, end, 5)?;
            let count = reader.read_u32()?;
            let value_type = reader.read_u8()?;
            let width = match value_type {
                1 => 2,
                2 => 1,
                3 | 4 => 4,
                other => return Err(DbError::UnsupportedCompressionKind(other as u32)),
            };
            ensure_room(reader, end, count as u64 * (4 + width as u64))?;

            let mut values = HashMap::with_capacity(count as usize);
            for _ in 0..count {
                let key = reader.read_u32()?;
                let value = utils::read_unsigned(reader, width)?;
                values.insert(key, value);
            }
            trace!("Common column {}: type {}, {} values", column, value_type, count);

            if values.is_empty() {
                continue;
            }
            match file_fields.get(column) {
                Some(&field) => {
                    table.columns.insert(field, values);
                }
                None => warn!("Common data column {} has no matching schema member", column),
            }
        }
        Ok(table)
    }

    /// Loads the WDC1 layout: one byte range per `CommonData` field.
    pub fn load_wdc1<R: Read + Seek>(
        reader: &mut BitReader<R>,
        section: &Section,
        fields: &[FieldDescriptor],
        schema: &Schema,
    ) -> Result<Self> {
        let mut table = Self::default();
        if !section.exists {
            return Ok(table);
        }

        for (index, field) in fields.iter().enumerate() {
            if field.from_index_table || !matches!(field.compression, CompressionKind::CommonData { .. }) {
                continue;
            }
            let width = schema.members()[index].ty.byte_size();
            let start = section.start + field.additional_data_offset;
            let end = start + field.additional_data_size as u64;
            debug!(
                "Loading common data for '{}' at {:#x}..{:#x} ({}-byte values)",
                field.name, start, end, width
            );
            if end > section.end() {
                return Err(DbError::UnexpectedEof { position: section.end() });
            }

            reader.seek(start)?;
            let mut values = HashMap::new();
            while reader.position() < end {
                ensure_room(reader, end, 4 + width as u64)?;
                let key = reader.read_u32()?;
                let value = read_padded_value(reader, width)?;
                values.insert(key, value);
            }
            table.columns.insert(index, values);
        }
        Ok(table)
    }
}

/// Fails unless `bytes` more bytes fit before `end`.
fn ensure_room<R: Read + Seek>(reader: &BitReader<R>, end: u64, bytes: u64) -> Result<()> {
    if reader.position().saturating_add(bytes) > end {
        return Err(DbError::UnexpectedEof { position: end });
    }
    Ok(())
}

/// Reads a `width`-byte value, then skips alignment padding when the next byte is NUL.
fn read_padded_value<R: Read + Seek>(reader: &mut BitReader<R>, width: u32) -> Result<u64> {
    let value = utils::read_unsigned(reader, width)?;
    if width < 4 && reader.peek_u8()? == Some(0) {
        reader.skip((4 - width) as u64)?;
    }
    Ok(value)
}
