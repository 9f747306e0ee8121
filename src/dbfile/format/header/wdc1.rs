//! WDC1: bit-packed records with extended field storage info.
//!
//! ```text
//! [ 4] signature 'WDC1'
//! [16] record_count, field_count, record_size, string_table_size
//! [ 8] table_hash, layout_hash
//! [ 8] min_key, max_key
//! [ 4] locale
//! [ 4] copy_table_size
//! [ 2] flags, [2] index_column
//! [ 4] total_field_count
//! [ 4] bitpacked_data_offset
//! [ 4] lookup_column_count
//! [ 4] offset_map_offset
//! [ 4] index_table_size
//! [ 4] field_storage_info_size
//! [ 4] common_data_size
//! [ 4] pallet_data_size
//! [ 4] relationship_data_size
//! [field_count * 4] (bit_width: i16, offset: u16)
//! [records | string pool]  or  [variable records | offset map]
//! [index table][copy table][field storage info][pallet][common data][relationship data]
//! ```
//!
//! Field storage info entries are 24 bytes each:
//!
//! ```text
//! [2] bit_offset  [2] bit_size  [4] additional_data_size  [4] compression
//! [12] compression parameters
//! ```

use std::io::{Read, Seek};

use log::{debug, info, trace};

use crate::dbfile::codec::BitReader;
use crate::dbfile::format::{FormatReader, fields};
use crate::dbfile::sections::common::CommonDataTable;
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::{
    CompressionKind, ExtendedFieldMeta, FieldDescriptor, FormatVersion, Layout, Section,
};
use crate::dbfile::types::schema::Schema;

use super::wdb5::FLAG_OFFSET_MAP;
use super::{HeaderData, ParsedHeader, Placement, place_data_sections, read_prefix, read_raw_fields};

#[derive(Debug)]
pub struct Wdc1;

impl FormatReader for Wdc1 {
    const VERSION: FormatVersion = FormatVersion::Wdc1;

    fn parse_header<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<ParsedHeader> {
        let Some(prefix) = read_prefix(reader)? else {
            info!("WDC1 file declares no records");
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
        let bitpacked_data_offset = reader.read_u32()?;
        let lookup_column_count = reader.read_u32()?;
        let offset_map_offset = reader.read_u32()?;
        let index_table_size = reader.read_u32()?;
        let field_storage_info_size = reader.read_u32()?;
        let common_data_size = reader.read_u32()?;
        let pallet_data_size = reader.read_u32()?;
        let relationship_data_size = reader.read_u32()?;
        debug!(
            "WDC1 table hash {:#010x}, layout hash {:#010x}, flags {:#06x}, bitpacked data at {}, {} lookup columns",
            table_hash, layout_hash, flags, bitpacked_data_offset, lookup_column_count
        );

        let raw_fields = read_raw_fields(reader, prefix.field_count)?;

        let variable = flags & FLAG_OFFSET_MAP != 0;
        let sections = place_data_sections(
            &prefix,
            min_key,
            max_key,
            Placement {
                data_start: reader.position(),
                variable,
                offset_map_offset: offset_map_offset as u64,
                index_table: (true, index_table_size),
                copy_table_size,
            },
        )?;
        let field_storage = Section::new(true, sections.copy_table.next_start(), field_storage_info_size);
        let pallet = Section::new(true, field_storage.next_start(), pallet_data_size);
        let common_data = Section::new(true, pallet.next_start(), common_data_size);
        if relationship_data_size != 0 {
            debug!(
                "Skipping {} bytes of relationship data at {:#x}",
                relationship_data_size,
                common_data.next_start()
            );
        }

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
            field_storage,
            pallet,
            common_data,
            ..Layout::default()
        };
        sections.apply(&mut layout);
        layout.validate(reader.len())?;

        let extended_fields = read_extended_fields(reader, &layout.field_storage)?;
        info!(
            "WDC1 layout: {} records of {} bytes, {}/{} fields ({} stored descriptors), keys {}..={}, variable={}",
            layout.record_count,
            layout.record_size,
            layout.field_count,
            layout.total_field_count,
            extended_fields.len(),
            min_key,
            max_key,
            variable
        );

        Ok(ParsedHeader::Populated(HeaderData {
            layout,
            raw_fields,
            extended_fields,
        }))
    }

    fn describe_fields(header: &HeaderData, schema: &Schema) -> Result<Vec<FieldDescriptor>> {
        fields::from_extended(&header.layout, &header.raw_fields, &header.extended_fields, schema)
    }

    fn verify_record_size(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()> {
        fields::verify_bit_span(layout, fields)
    }

    fn load_common_data<R: Read + Seek>(
        reader: &mut BitReader<R>,
        layout: &Layout,
        fields: &[FieldDescriptor],
        schema: &Schema,
    ) -> Result<CommonDataTable> {
        CommonDataTable::load_wdc1(reader, &layout.common_data, fields, schema)
    }
}

/// Reads field storage info entries until the end of their section.
fn read_extended_fields<R: Read + Seek>(
    reader: &mut BitReader<R>,
    section: &Section,
) -> Result<Vec<ExtendedFieldMeta>> {
    let mut entries = Vec::new();
    if !section.exists {
        return Ok(entries);
    }

    reader.seek(section.start)?;
    while reader.position() < section.end() {
        let bit_offset = reader.read_u16()?;
        let bit_size = reader.read_u16()?;
        let additional_data_size = reader.read_i32()?.max(0) as u32;
        let kind = reader.read_u32()?;
        let mut params = [0u8; 12];
        params.copy_from_slice(&reader.read_bytes(12)?);
        let compression = CompressionKind::from_raw(kind, params)?;

        let entry = ExtendedFieldMeta {
            bit_offset,
            bit_size,
            additional_data_size,
            compression,
        };
        trace!("Field storage info #{}: {:?}", entries.len(), entry);
        entries.push(entry);
    }
    Ok(entries)
}
