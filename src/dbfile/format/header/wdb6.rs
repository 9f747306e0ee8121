//! WDB6: WDB5 plus a common-data table.
//!
//! ```text
//! [48] WDB5 header (signature through index_column)
//! [ 4] total_field_count
//! [ 4] common_data_size
//! [field_count * 4] (bit_width: i16, offset: u16)
//! ... WDB5 sections ...
//! [common_data_size] common-data table
//! ```
//!
//! Fields past `field_count` are not stored in the record; they live only in
//! the common-data table and default to zero.

use std::io::{Read, Seek};

use log::{debug, info};

use crate::dbfile::codec::BitReader;
use crate::dbfile::format::{FormatReader, fields};
use crate::dbfile::sections::common::CommonDataTable;
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::{FieldDescriptor, FormatVersion, Layout, Section};
use crate::dbfile::types::schema::Schema;

use super::wdb5::{FLAG_INDEX_TABLE, FLAG_OFFSET_MAP};
use super::{HeaderData, ParsedHeader, Placement, place_data_sections, read_prefix, read_raw_fields, table_size};

#[derive(Debug)]
pub struct Wdb6;

impl FormatReader for Wdb6 {
    const VERSION: FormatVersion = FormatVersion::Wdb6;

    fn parse_header<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<ParsedHeader> {
        let Some(prefix) = read_prefix(reader)? else {
            info!("WDB6 file declares no records");
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
        let total_field_count = reader.read_u32()?;
        let common_data_size = reader.read_u32()?;
        debug!(
            "WDB6 table hash {:#010x}, layout hash {:#010x}, flags {:#06x}, {} total fields",
            table_hash, layout_hash, flags, total_field_count
        );

        let raw_fields = read_raw_fields(reader, prefix.field_count)?;

        let variable = flags & FLAG_OFFSET_MAP != 0;
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
                    flags & FLAG_INDEX_TABLE != 0,
                    table_size("index table", data_start, prefix.record_count, 4)?,
                ),
                copy_table_size,
            },
        )?;
        let common_data = Section::new(true, sections.copy_table.next_start(), common_data_size);

        let mut layout = Layout {
            record_count: prefix.record_count,
            record_size: prefix.record_size,
            field_count: prefix.field_count,
            total_field_count: total_field_count.max(prefix.field_count),
            min_key,
            max_key,
            table_hash,
            layout_hash,
            locale,
            index_column: index_column as u32,
            flags,
            inline_strings: variable,
            common_data,
            ..Layout::default()
        };
        sections.apply(&mut layout);
        info!(
            "WDB6 layout: {} records of {} bytes, {}/{} fields, keys {}..={}, common data {} bytes",
            layout.record_count,
            layout.record_size,
            layout.field_count,
            layout.total_field_count,
            min_key,
            max_key,
            common_data_size
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

    fn load_common_data<R: Read + Seek>(
        reader: &mut BitReader<R>,
        layout: &Layout,
        fields: &[FieldDescriptor],
        _schema: &Schema,
    ) -> Result<CommonDataTable> {
        CommonDataTable::load_wdb6(reader, &layout.common_data, fields)
    }
}
