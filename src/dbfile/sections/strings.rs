//! String pool resolution.
//!
//! Strings are stored either inline (NUL-terminated, at the cursor) or as a
//! 4-byte offset relative to the start of the string pool section. Pooled
//! lookups are non-destructive: the cursor, bit state included, is restored
//! after the indirection.

use std::io::{Read, Seek};

use log::trace;

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::{Layout, Section};

/// Reads the string at `offset` inside `pool` and restores the cursor.
pub fn read_pooled<R: Read + Seek>(reader: &mut BitReader<R>, pool: &Section, offset: u32) -> Result<String> {
    let target = pool.start + offset as u64;
    if offset >= pool.size {
        return Err(DbError::UnexpectedEof { position: target });
    }

    let saved = reader.bit_position();
    reader.seek(target)?;
    let value = reader.read_cstring()?;
    reader.seek_bits(saved)?;

    trace!("String pool [{:#x}] -> {:?}", offset, value);
    Ok(value)
}

/// Reads one string field at the cursor, following the layout's storage convention.
pub fn read_field<R: Read + Seek>(reader: &mut BitReader<R>, layout: &Layout) -> Result<String> {
    if layout.inline_strings {
        return reader.read_cstring();
    }
    let offset = reader.read_u32()?;
    read_pooled(reader, &layout.string_pool, offset)
}
