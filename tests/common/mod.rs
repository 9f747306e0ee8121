//! Synthetic in-memory database files for the integration tests.
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Little-endian byte sink with chained writes.
#[derive(Debug, Default, Clone)]
pub struct Bytes {
    buf: Vec<u8>,
}

impl Bytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.write_u8(v).unwrap();
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.buf.write_u16::<LittleEndian>(v).unwrap();
        self
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.buf.write_i16::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u24(mut self, v: u32) -> Self {
        self.buf.write_u24::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.write_u32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.buf.write_i32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.buf.write_f32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn cstr(mut self, s: &str) -> Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn zeros(mut self, count: usize) -> Self {
        self.buf.resize(self.buf.len() + count, 0);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Most-significant-bit-first writer, matching the reader's bit order.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    used: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, value: u64, width: u32) -> &mut Self {
        for i in (0..width).rev() {
            if self.used == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= bit << (7 - self.used);
            self.used = (self.used + 1) % 8;
        }
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

pub fn wdbc(record_count: u32, field_count: u32, record_size: u32, records: &[u8], strings: &[u8]) -> Vec<u8> {
    Bytes::new()
        .raw(b"WDBC")
        .u32(record_count)
        .u32(field_count)
        .u32(record_size)
        .u32(strings.len() as u32)
        .raw(records)
        .raw(strings)
        .build()
}

/// Everything after the signature up to and including `index_column`, shared by WDB5, WDB6 and WDC1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModernHeader {
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_table_size: u32,
    pub min_key: i32,
    pub max_key: i32,
    pub copy_table_size: u32,
    pub flags: u16,
    pub index_column: u16,
}

impl ModernHeader {
    pub fn write(&self, signature: &[u8; 4]) -> Bytes {
        Bytes::new()
            .raw(signature)
            .u32(self.record_count)
            .u32(self.field_count)
            .u32(self.record_size)
            .u32(self.string_table_size)
            .u32(0xDEAD_BEEF)
            .u32(0x1234_5678)
            .i32(self.min_key)
            .i32(self.max_key)
            .u32(0)
            .u32(self.copy_table_size)
            .u16(self.flags)
            .u16(self.index_column)
    }
}

/// `(bit_width, offset)` pairs.
pub fn raw_fields(mut out: Bytes, fields: &[(i16, u16)]) -> Bytes {
    for &(bit_width, offset) in fields {
        out = out.i16(bit_width).u16(offset);
    }
    out
}

/// One 24-byte WDC1 field storage info entry.
pub fn storage_info(out: Bytes, bit_offset: u16, bit_size: u16, additional: u32, kind: u32, params: [u32; 3]) -> Bytes {
    out.u16(bit_offset)
        .u16(bit_size)
        .u32(additional)
        .u32(kind)
        .u32(params[0])
        .u32(params[1])
        .u32(params[2])
}

/// WDC1 size block following `total_field_count`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wdc1Sizes {
    pub total_field_count: u32,
    pub offset_map_offset: u32,
    pub index_table_size: u32,
    pub field_storage_info_size: u32,
    pub common_data_size: u32,
    pub pallet_data_size: u32,
    pub relationship_data_size: u32,
}

impl Wdc1Sizes {
    pub fn write(&self, out: Bytes) -> Bytes {
        out.u32(self.total_field_count)
            .u32(0)
            .u32(0)
            .u32(self.offset_map_offset)
            .u32(self.index_table_size)
            .u32(self.field_storage_info_size)
            .u32(self.common_data_size)
            .u32(self.pallet_data_size)
            .u32(self.relationship_data_size)
    }
}

/// Field metadata and sections of a WDB5 / WDB6 file, in file order.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub fields: Vec<(i16, u16)>,
    /// Fixed records, or the variable record area when `offset_map` is non-empty.
    pub data: Vec<u8>,
    pub strings: Vec<u8>,
    pub offset_map: Vec<(u32, u16)>,
    pub index: Vec<u32>,
    pub copies: Vec<(u32, u32)>,
}

impl Body {
    /// Absolute offset of the first record for a header of `header_size` bytes.
    pub fn data_start(&self, header_size: usize) -> usize {
        header_size + self.fields.len() * 4
    }

    fn finish(&self, header_size: usize, header: &mut ModernHeader) {
        header.field_count = self.fields.len() as u32;
        header.copy_table_size = self.copies.len() as u32 * 8;
        header.string_table_size = if self.offset_map.is_empty() {
            self.strings.len() as u32
        } else {
            (self.data_start(header_size) + self.data.len()) as u32
        };
    }

    fn write(&self, out: Bytes) -> Bytes {
        let mut out = raw_fields(out, &self.fields).raw(&self.data);
        if self.offset_map.is_empty() {
            out = out.raw(&self.strings);
        } else {
            for &(offset, length) in &self.offset_map {
                out = out.u32(offset).u16(length);
            }
        }
        for &key in &self.index {
            out = out.u32(key);
        }
        for &(new_key, old_key) in &self.copies {
            out = out.u32(new_key).u32(old_key);
        }
        out
    }
}

pub fn wdb5(mut header: ModernHeader, body: &Body) -> Vec<u8> {
    body.finish(48, &mut header);
    body.write(header.write(b"WDB5")).build()
}

pub fn wdb6(mut header: ModernHeader, total_field_count: u32, body: &Body, common: &[u8]) -> Vec<u8> {
    body.finish(56, &mut header);
    let out = header.write(b"WDB6").u32(total_field_count).u32(common.len() as u32);
    body.write(out).raw(common).build()
}
