//! Core data structures shared by every container variant.
//!
//! This module defines the canonical, variant-independent view of a file:
//! - [`FormatVersion`]: which of the five layouts the file uses
//! - [`Section`] and [`Layout`]: where each table lives in the byte source
//! - [`RawFieldMeta`] / [`ExtendedFieldMeta`]: per-field metadata as stored on disk
//! - [`CompressionKind`] and [`FieldDescriptor`]: how each schema member is decoded
//! - [`ReaderOptions`]: caller-controlled loading behaviour

use std::fmt;

use super::error::{DbError, Result};

/// The five known container variants, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    Wdbc,
    Wdb2,
    Wdb5,
    Wdb6,
    Wdc1,
}

impl FormatVersion {
    /// The 32-bit tag obtained by reading the signature bytes as a little-endian integer.
    pub fn tag(self) -> u32 {
        match self {
            FormatVersion::Wdbc => 0x4342_4457,
            FormatVersion::Wdb2 => 0x3242_4457,
            FormatVersion::Wdb5 => 0x3542_4457,
            FormatVersion::Wdb6 => 0x3642_4457,
            FormatVersion::Wdc1 => 0x3143_4457,
        }
    }

    /// The signature as it appears in the file.
    pub fn signature(self) -> [u8; 4] {
        self.tag().to_le_bytes()
    }

    /// Size of the fixed header, signature included.
    pub fn header_size(self) -> u64 {
        match self {
            FormatVersion::Wdbc => 20,
            FormatVersion::Wdb2 | FormatVersion::Wdb5 => 48,
            FormatVersion::Wdb6 => 56,
            FormatVersion::Wdc1 => 84,
        }
    }
}

impl TryFrom<[u8; 4]> for FormatVersion {
    type Error = DbError;
    fn try_from(bytes: [u8; 4]) -> Result<Self> {
        match u32::from_le_bytes(bytes) {
            0x4342_4457 => Ok(Self::Wdbc),
            0x3242_4457 => Ok(Self::Wdb2),
            0x3542_4457 => Ok(Self::Wdb5),
            0x3642_4457 => Ok(Self::Wdb6),
            0x3143_4457 => Ok(Self::Wdc1),
            _ => Err(DbError::UnknownSignature(bytes)),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sig = self.signature();
        write!(f, "{}", String::from_utf8_lossy(&sig))
    }
}

/// A byte range inside the stream.
///
/// A section declared with a size of zero never exists, whatever its flag says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Section {
    pub exists: bool,
    pub start: u64,
    pub size: u32,
}

impl Section {
    pub fn new(exists: bool, start: u64, size: u32) -> Self {
        Self {
            exists: exists && size != 0,
            start,
            size,
        }
    }

    /// End offset; only meaningful when the section exists.
    pub fn end(&self) -> u64 {
        self.start + self.size as u64
    }

    /// Where the next section starts: `end()` when present, `start` otherwise.
    pub fn next_start(&self) -> u64 {
        if self.exists { self.end() } else { self.start }
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.exists && offset >= self.start && offset < self.end()
    }
}

/// Canonical description of one file, produced by a header parser.
///
/// Computed once and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub record_count: u32,
    pub record_size: u32,
    pub field_count: u32,
    /// Fields including those living only in compressed sections. Equals `field_count` before WDB6.
    pub total_field_count: u32,
    pub min_key: i32,
    pub max_key: i32,
    /// Identifies the table across client builds (WDB2 and later).
    pub table_hash: u32,
    /// Identifies the record layout (WDB5 and later).
    pub layout_hash: u32,
    /// Client build the file was written for (WDB2 only).
    pub build: u32,
    pub locale: u32,
    pub index_column: u32,
    pub flags: u16,
    /// Strings are stored inline in the record bytes instead of a string pool.
    pub inline_strings: bool,

    pub record_table: Section,
    pub string_pool: Section,
    /// Variable-length record data addressed through the offset map.
    pub variable_records: Section,
    pub offset_map: Section,
    pub index_table: Section,
    pub copy_table: Section,
    /// Extended per-field descriptors (WDC1 only).
    pub field_storage: Section,
    pub pallet: Section,
    pub common_data: Section,
}

impl Layout {
    /// Records are addressed through the offset map rather than at a fixed stride.
    pub fn has_variable_records(&self) -> bool {
        self.offset_map.exists
    }

    /// All sections with their names, for bounds validation and logging.
    pub fn sections(&self) -> [(&'static str, &Section); 9] {
        [
            ("record table", &self.record_table),
            ("string pool", &self.string_pool),
            ("variable records", &self.variable_records),
            ("offset map", &self.offset_map),
            ("index table", &self.index_table),
            ("copy table", &self.copy_table),
            ("field storage info", &self.field_storage),
            ("pallet", &self.pallet),
            ("common data", &self.common_data),
        ]
    }

    /// Checks that every existing section lies within a stream of `stream_len` bytes.
    pub fn validate(&self, stream_len: u64) -> Result<()> {
        for (name, section) in self.sections() {
            if section.exists && section.end() > stream_len {
                return Err(DbError::SectionOutOfBounds {
                    section: name,
                    end: section.end(),
                    stream_len,
                });
            }
        }
        Ok(())
    }
}

/// A `(bit_width, offset)` pair as stored after the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFieldMeta {
    pub bit_width: i16,
    pub offset: u16,
}

impl RawFieldMeta {
    /// Byte width under the legacy convention: `(32 - bit_width) / 8`.
    pub fn byte_size(&self) -> Result<u32> {
        let size = (32 - self.bit_width as i32) / 8;
        if !(0..=8).contains(&size) {
            return Err(DbError::InvalidBitWidth(self.bit_width as i64));
        }
        Ok(size as u32)
    }
}

/// How a field's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Plain fixed-width value(s) in the record bytes.
    None,
    /// A sub-byte integer in the record's bit region.
    Bitpacked { signed: bool },
    /// Absent from the record; looked up by key, with a raw 4-byte default.
    CommonData { default: u32 },
    /// A bit-packed index into the pallet.
    BitpackedIndexed,
    /// A bit-packed index addressing `array_size` consecutive pallet words.
    BitpackedIndexedArray { array_size: u32 },
}

impl CompressionKind {
    /// Decodes an extended descriptor's kind and its 12-byte parameter block.
    pub fn from_raw(kind: u32, params: [u8; 12]) -> Result<Self> {
        let word = |i: usize| u32::from_le_bytes([params[i], params[i + 1], params[i + 2], params[i + 3]]);
        match kind {
            0 => Ok(Self::None),
            1 => Ok(Self::Bitpacked {
                signed: word(8) & 0x01 != 0,
            }),
            2 => Ok(Self::CommonData { default: word(0) }),
            3 => Ok(Self::BitpackedIndexed),
            4 => Ok(Self::BitpackedIndexedArray { array_size: word(8) }),
            other => Err(DbError::UnsupportedCompressionKind(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionKind::None => "none",
            CompressionKind::Bitpacked { .. } => "bitpacked",
            CompressionKind::CommonData { .. } => "common data",
            CompressionKind::BitpackedIndexed => "bitpacked indexed",
            CompressionKind::BitpackedIndexedArray { .. } => "bitpacked indexed array",
        }
    }

    /// Whether the value occupies bits inside the record itself.
    pub fn is_in_record(&self) -> bool {
        !matches!(self, CompressionKind::CommonData { .. })
    }

    pub fn is_bit_addressed(&self) -> bool {
        matches!(
            self,
            CompressionKind::Bitpacked { .. }
                | CompressionKind::BitpackedIndexed
                | CompressionKind::BitpackedIndexedArray { .. }
        )
    }

    /// Kinds sharing one additional-data block; the two pallet kinds share a pool.
    pub(crate) fn pool_class(&self) -> u8 {
        match self {
            CompressionKind::None => 0,
            CompressionKind::Bitpacked { .. } => 1,
            CompressionKind::CommonData { .. } => 2,
            CompressionKind::BitpackedIndexed | CompressionKind::BitpackedIndexedArray { .. } => 3,
        }
    }
}

/// One 24-byte entry of the WDC1 field storage info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedFieldMeta {
    pub bit_offset: u16,
    pub bit_size: u16,
    pub additional_data_size: u32,
    pub compression: CompressionKind,
}

/// Decode instructions for one schema member.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub byte_size: u32,
    pub bit_size: u32,
    pub offset: u32,
    pub bit_offset: u32,
    pub array_length: u32,
    pub compression: CompressionKind,
    pub additional_data_offset: u64,
    pub additional_data_size: u32,
    /// The key member has no on-disk metadata; its value comes from the index table.
    pub from_index_table: bool,
}

impl FieldDescriptor {
    /// A plain field at `offset` of `array_length` elements of `byte_size` bytes.
    pub fn plain(name: impl Into<String>, byte_size: u32, offset: u32, array_length: u32) -> Self {
        Self {
            name: name.into(),
            byte_size,
            bit_size: byte_size * 8,
            offset,
            bit_offset: offset * 8,
            array_length,
            compression: CompressionKind::None,
            additional_data_offset: 0,
            additional_data_size: 0,
            from_index_table: false,
        }
    }

    /// The key member of a file carrying an index table.
    pub fn index_key(name: impl Into<String>, byte_size: u32) -> Self {
        Self {
            from_index_table: true,
            bit_size: 0,
            bit_offset: 0,
            ..Self::plain(name, byte_size, 0, 1)
        }
    }

    /// Whether this field occupies bytes of the record.
    pub fn is_in_record(&self) -> bool {
        !self.from_index_table && self.compression.is_in_record()
    }

    /// Bytes covered inside the record by a plain field.
    pub fn span(&self) -> u32 {
        self.byte_size * self.array_length
    }
}

/// Caller-controlled loading behaviour.
///
/// ```
/// # use dbfile_reader::ReaderOptions;
/// let options = ReaderOptions::default().load_string_pool(true);
/// assert!(options.load_records);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// When false, no records are decoded.
    pub load_records: bool,
    /// When true, the string pool may be scanned up front.
    pub load_string_pool: bool,
    /// Run the record-size consistency check before decoding.
    pub verify_record_size: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            load_records: true,
            load_string_pool: false,
            verify_record_size: true,
        }
    }
}

impl ReaderOptions {
    pub fn load_records(mut self, value: bool) -> Self {
        self.load_records = value;
        self
    }

    pub fn load_string_pool(mut self, value: bool) -> Self {
        self.load_string_pool = value;
        self
    }

    pub fn verify_record_size(mut self, value: bool) -> Self {
        self.verify_record_size = value;
        self
    }
}
