//! WDBC: the oldest variant.
//!
//! ```text
//! [ 4] signature 'WDBC'
//! [ 4] record_count
//! [ 4] field_count
//! [ 4] record_size
//! [ 4] string_block_size
//! [record_count * record_size] records
//! [string_block_size]          string pool
//! ```
//!
//! No per-field metadata is stored: fields are packed back to back using the
//! schema's element widths.

use std::io::{Read, Seek};

use log::info;

use crate::dbfile::codec::BitReader;
use crate::dbfile::format::{FormatReader, fields};
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::{FieldDescriptor, FormatVersion, Layout, Section};
use crate::dbfile::types::schema::Schema;

use super::{HeaderData, ParsedHeader, read_prefix, table_size};

#[derive(Debug)]
pub struct Wdbc;

impl FormatReader for Wdbc {
    const VERSION: FormatVersion = FormatVersion::Wdbc;

    fn parse_header<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<ParsedHeader> {
        let Some(prefix) = read_prefix(reader)? else {
            info!("WDBC file declares no records");
            return Ok(ParsedHeader::Empty);
        };

        let start = reader.position();
        let record_table = Section::new(
            true,
            start,
            table_size("record table", start, prefix.record_count, prefix.record_size)?,
        );
        let string_pool = Section::new(true, record_table.end(), prefix.string_table_size);

        let layout = Layout {
            record_count: prefix.record_count,
            record_size: prefix.record_size,
            field_count: prefix.field_count,
            total_field_count: prefix.field_count,
            record_table,
            string_pool,
            ..Layout::default()
        };
        info!(
            "WDBC layout: {} records of {} bytes, {} fields, {} bytes of strings",
            layout.record_count, layout.record_size, layout.field_count, prefix.string_table_size
        );

        Ok(ParsedHeader::Populated(HeaderData {
            layout,
            ..HeaderData::default()
        }))
    }

    fn describe_fields(header: &HeaderData, schema: &Schema) -> Result<Vec<FieldDescriptor>> {
        fields::from_schema(&header.layout, schema)
    }

    fn verify_record_size(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()> {
        fields::verify_packed(layout, fields)
    }
}
