//! Byte- and bit-granularity reads over a seekable byte source.
//!
//! The reader tracks two cursors: the byte position in the stream and a bit
//! cursor (0..=7) inside a buffered byte. Bits are consumed most significant
//! first and assembled most significant first:
//!
//! ```text
//!  byte 0x2C = 0 0 1 0 1 1 0 0
//!              ^ bit cursor 0   read_bits(3) -> 0b001 = 1
//!                    ^ cursor 3 read_bits(3) -> 0b011 = 3
//! ```
//!
//! While a partial byte is buffered, byte-typed reads are served from the bit
//! stream (`read_u16` becomes `read_bits(16)`); otherwise they are plain
//! little-endian reads. Any explicit seek drops the buffered byte and resets the
//! bit cursor, so no read ever mixes state from before and after a seek.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;

use crate::dbfile::types::error::{DbError, Result};

pub struct BitReader<R> {
    inner: R,
    len: u64,
    /// Byte position of the next byte the inner stream will yield.
    pos: u64,
    current: u8,
    bit_cursor: u8,
    /// A partially consumed byte is held in `current`.
    buffered: bool,
}

impl<'a> BitReader<Cursor<&'a [u8]>> {
    /// Wraps an in-memory buffer; its length is known up front.
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(bytes),
            len: bytes.len() as u64,
            pos: 0,
            current: 0,
            bit_cursor: 0,
            buffered: false,
        }
    }
}

impl<R: Read + Seek> BitReader<R> {
    /// Wraps `inner`, measuring its length and rewinding it to the start.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        trace!("Bit reader over {} bytes", len);
        Ok(Self {
            inner,
            len,
            pos: 0,
            current: 0,
            bit_cursor: 0,
            buffered: false,
        })
    }

    /// Total length of the byte source.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte position. While a partial byte is buffered this points past that byte.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Absolute position in bits, accounting for the buffered byte.
    pub fn bit_position(&self) -> u64 {
        if self.buffered {
            (self.pos - 1) * 8 + self.bit_cursor as u64
        } else {
            self.pos * 8
        }
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Whether the next read starts on a byte boundary.
    pub fn is_aligned(&self) -> bool {
        !self.buffered
    }

    /// Moves to an absolute byte position and clears the bit state.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        self.reset_bits();
        Ok(())
    }

    /// Moves to an absolute bit position.
    pub fn seek_bits(&mut self, bit_pos: u64) -> Result<()> {
        self.seek(bit_pos / 8)?;
        let cursor = (bit_pos % 8) as u8;
        if cursor != 0 {
            self.current = self.next_byte()?;
            self.buffered = true;
            self.bit_cursor = cursor;
        }
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek(self.pos + count)
    }

    /// Drops the remaining bits of the buffered byte, if any.
    pub fn reset_bits(&mut self) {
        self.buffered = false;
        self.bit_cursor = 0;
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if !self.buffered {
            self.current = self.next_byte()?;
            self.buffered = true;
            self.bit_cursor = 0;
        }

        let bit = (self.current >> (7 - self.bit_cursor)) & 1;

        self.bit_cursor += 1;
        if self.bit_cursor > 7 {
            self.reset_bits();
        }
        Ok(bit != 0)
    }

    /// Reads `width` bits, most significant first.
    ///
    /// # Errors
    /// `InvalidBitWidth` if `width` is negative or above 64, `UnexpectedEof`
    /// if the stream ends first.
    pub fn read_bits(&mut self, width: i32) -> Result<u64> {
        if !(0..=64).contains(&width) {
            return Err(DbError::InvalidBitWidth(width as i64));
        }
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.buffered {
            return Ok(self.read_bits(8)? as u8);
        }
        self.next_byte()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        if self.buffered {
            return Ok(self.read_bits(16)? as u16);
        }
        self.aligned(2, |r| r.read_u16::<LittleEndian>())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Reads a 3-byte integer: `b0 | b1 << 8 | b2 << 16`.
    pub fn read_u24(&mut self) -> Result<u32> {
        if self.buffered {
            return Ok(self.read_bits(24)? as u32);
        }
        self.aligned(3, |r| r.read_u24::<LittleEndian>())
    }

    /// Reads a 3-byte integer, sign-extended from bit 23.
    pub fn read_i24(&mut self) -> Result<i32> {
        let raw = self.read_u24()?;
        Ok(((raw << 8) as i32) >> 8)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        if self.buffered {
            return Ok(self.read_bits(32)? as u32);
        }
        self.aligned(4, |r| r.read_u32::<LittleEndian>())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        if self.buffered {
            return self.read_bits(64);
        }
        self.aligned(8, |r| r.read_u64::<LittleEndian>())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads an unsigned little-endian integer of 1 to 8 bytes.
    pub fn read_uint(&mut self, byte_size: u32) -> Result<u64> {
        if !(1..=8).contains(&byte_size) {
            return Err(DbError::InvalidBitWidth(byte_size as i64 * 8));
        }
        if self.buffered {
            return self.read_bits(byte_size as i32 * 8);
        }
        self.aligned(byte_size as u64, |r| r.read_uint::<LittleEndian>(byte_size as usize))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if self.buffered {
            return (0..count).map(|_| self.read_u8()).collect();
        }
        self.aligned(count as u64, |r| {
            let mut buf = vec![0u8; count];
            r.read_exact(&mut buf)?;
            Ok(buf)
        })
    }

    /// Reads a NUL-terminated string, replacing invalid UTF-8 sequences.
    pub fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Returns the next stream byte without consuming it, `None` at the end of the stream.
    pub fn peek_u8(&mut self) -> Result<Option<u8>> {
        if self.pos >= self.len {
            return Ok(None);
        }
        let byte = self.inner.read_u8().map_err(|e| self.map_io(e))?;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(Some(byte))
    }

    fn next_byte(&mut self) -> Result<u8> {
        self.aligned(1, |r| r.read_u8())
    }

    fn aligned<T>(&mut self, size: u64, read: impl FnOnce(&mut R) -> io::Result<T>) -> Result<T> {
        if self.remaining() < size {
            return Err(DbError::UnexpectedEof { position: self.pos });
        }
        let value = read(&mut self.inner).map_err(|e| self.map_io(e))?;
        self.pos += size;
        Ok(value)
    }

    fn map_io(&self, err: io::Error) -> DbError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DbError::UnexpectedEof { position: self.pos }
        } else {
            DbError::Io(err)
        }
    }
}
