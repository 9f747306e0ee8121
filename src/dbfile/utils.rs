//! Low-level sizing and integer helpers

use std::io::{Read, Seek};

use super::codec::BitReader;
use super::types::error::{DbError, Result};

/// Read an unsigned little-endian integer of `byte_size` bytes.
///
/// Fields stored truncated to 1-4 bytes (and 8-byte fields) share this switch;
/// the 3-byte case goes through the dedicated 24-bit primitive.
pub fn read_unsigned<R: Read + Seek>(reader: &mut BitReader<R>, byte_size: u32) -> Result<u64> {
    match byte_size {
        8 => reader.read_u64(),
        4 => Ok(reader.read_u32()? as u64),
        3 => Ok(reader.read_u24()? as u64),
        2 => Ok(reader.read_u16()? as u64),
        1 => Ok(reader.read_u8()? as u64),
        5..=7 => reader.read_uint(byte_size),
        _ => Err(DbError::InvalidBitWidth(byte_size as i64 * 8)),
    }
}

/// Sign-extend the low `bits` bits of `raw`.
pub fn sign_extend(raw: u64, bits: u32) -> u64 {
    if bits == 0 || bits >= 64 {
        return raw;
    }
    let shift = 64 - bits;
    (((raw << shift) as i64) >> shift) as u64
}

/// Round `value` up to the next multiple of `alignment`.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}
