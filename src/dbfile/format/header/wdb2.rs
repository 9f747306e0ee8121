//! WDB2: WDBC with build information and a key range.
//!
//! ```text
//! [ 4] signature 'WDB2'
//! [16] record_count, field_count, record_size, string_table_size
//! [ 4] table_hash
//! [ 4] build
//! [ 4] timestamp
//! [ 4] min_key
//! [ 4] max_key
//! [ 4] locale
//! [ 4] copy_table_size
//! [(max - min + 1) * 6]  legacy lookup block, only when max_key != 0
//! [record_count * record_size] records
//! [string_table_size]          string pool
//! ```

use std::io::{Read, Seek};

use log::{debug, info};

use crate::dbfile::codec::BitReader;
use crate::dbfile::format::{FormatReader, fields};
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::{FieldDescriptor, FormatVersion, Layout, Section};
use crate::dbfile::types::schema::Schema;

use super::{HeaderData, ParsedHeader, offset_map_size, read_prefix, table_size};

#[derive(Debug)]
pub struct Wdb2;

impl FormatReader for Wdb2 {
    const VERSION: FormatVersion = FormatVersion::Wdb2;

    fn parse_header<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<ParsedHeader> {
        let Some(prefix) = read_prefix(reader)? else {
            info!("WDB2 file declares no records");
            return Ok(ParsedHeader::Empty);
        };

        let table_hash = reader.read_u32()?;
        let build = reader.read_u32()?;
        reader.skip(4)?; // timestamp
        let min_key = reader.read_i32()?;
        let max_key = reader.read_i32()?;
        let locale = reader.read_u32()?;
        let copy_table_size = reader.read_u32()?;
        debug!("WDB2 table hash {:#010x}, build {}", table_hash, build);
        if copy_table_size != 0 {
            debug!("Ignoring WDB2 copy table size {}", copy_table_size);
        }

        if max_key != 0 {
            let legacy = offset_map_size(reader.position(), min_key, max_key)?;
            debug!("Skipping {} bytes of legacy lookup data", legacy);
            reader.skip(legacy as u64)?;
        }

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
            min_key,
            max_key,
            table_hash,
            build,
            locale,
            record_table,
            string_pool,
            ..Layout::default()
        };
        info!(
            "WDB2 layout: {} records of {} bytes, {} fields, keys {}..={}",
            layout.record_count, layout.record_size, layout.field_count, min_key, max_key
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
