//! WDB5: per-field metadata, optional index table and variable records.
//!
//! ```text
//! [ 4] signature 'WDB5'
//! [16] record_count, field_count, record_size, string_table_size
//! [ 8] table_hash, layout_hash
//! [ 8] min_key, max_key
//! [ 4] locale
//! [ 4] copy_table_size
//! [ 2] flags          0x01 offset map (strings inline), 0x04 index table
//! [ 2] index_column
//! [field_count * 4] (bit_width: i16, offset: u16)
//! ```
//!
//! With flag `0x01`, `string_table_size` holds the absolute offset of the
//! offset map instead of a pool size.

use std::io::{Read, Seek};

use log::{debug, info};

use crate::dbfile::codec::BitReader;
use crate::dbfile::format::{FormatReader, fields};
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::{FieldDescriptor, FormatVersion, Layout};
use crate::dbfile::types::schema::Schema;

use super::{HeaderData, ParsedHeader, Placement, place_data_sections, read_prefix, read_raw_fields, table_size};

pub(crate) const FLAG_OFFSET_MAP: u16 = 0x01;
pub(crate) const FLAG_INDEX_TABLE: u16 = 0x04;

#[derive(Debug)]
pub struct Wdb5;

impl FormatReader for Wdb5 {
    const VERSION: FormatVersion = FormatVersion::Wdb5;

    fn parse_header<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<ParsedHeader> {
        let Some(prefix) = read_prefix(reader)? else {
            info!("WDB5 file declares no records");
            return Ok(ParsedHeader::Empty);
        };

        let table_hash = reader.read_u32()?;
        let layout_hash = reader.read_u32()?;
        let min_key = reader.read_i32()?;
        let max_key = reader.read_i32()?;
        let locale = reader.read_u32()?;
        let copy_table_size = reader.read_u32()?;
        let flags = reader.read_u16()?;
        let index_column = reader.read_u16()?;
        debug!(
            "WDB5 table hash {:#010x}, layout hash {:#010x}, flags {:#06x}",
            table_hash, layout_hash, flags
        );

        let raw_fields = read_raw_fields(reader, prefix.field_count)?;

        let variable = flags & FLAG_OFFSET_MAP != 0;
        let has_index = flags & FLAG_INDEX_TABLE != 0;
        let data_start = reader.position();
        let sections = place_data_sections(
            &prefix,
            min_key,
            max_key,
            Placement {
                data_start,
                variable,
                offset_map_offset: prefix.string_table_size as u64,
                index_table: (
                    has_index,
                    table_size("index table", data_start, prefix.record_count, 4)?,
                ),
                copy_table_size,
            },
        )?;

        let mut layout = Layout {
            record_count: prefix.record_count,
            record_size: prefix.record_size,
            field_count: prefix.field_count,
            total_field_count: prefix.field_count,
            min_key,
            max_key,
            table_hash,
            layout_hash,
            locale,
            index_column: index_column as u32,
            flags,
            inline_strings: variable,
            ..Layout::default()
        };
        sections.apply(&mut layout);
        info!(
            "WDB5 layout: {} records of {} bytes, {} fields, keys {}..={}, variable={}, index table={}",
            layout.record_count,
            layout.record_size,
            layout.field_count,
            min_key,
            max_key,
            variable,
            layout.index_table.exists
        );

        Ok(ParsedHeader::Populated(HeaderData {
            layout,
            raw_fields,
            ..HeaderData::default()
        }))
    }

    fn describe_fields(header: &HeaderData, schema: &Schema) -> Result<Vec<FieldDescriptor>> {
        fields::from_raw(&header.layout, &header.raw_fields, schema)
    }

    fn verify_record_size(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()> {
        fields::verify_aligned(layout, fields)
    }
}
