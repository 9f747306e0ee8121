use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{info, warn};

use super::codec::BitReader;
use super::decode::{DecodeContext, RecordDecoder};
use super::format;
use super::iter::{RecordIterator, StringPoolIterator};
use super::types::error::Result;
use super::types::models::{FieldDescriptor, FormatVersion, Layout, ReaderOptions, Section};
use super::types::schema::Schema;
use super::types::value::{Record, RecordKey};

/// A client database file, parsed and ready to decode.
///
/// The whole file is held in memory. Header, field descriptors and every
/// lookup section are built once in [`open`](Self::open); records are decoded
/// lazily, each iterator or [`record_at`](Self::record_at) call owning its own
/// cursor, so a `DbFile` can be shared across threads.
#[derive(Debug)]
pub struct DbFile {
    bytes: Vec<u8>,
    schema: Schema,
    options: ReaderOptions,
    format: FormatVersion,
    /// `None` for a file declaring zero records.
    context: Option<DecodeContext>,
}

impl DbFile {
    /// Read a database file from the given path.
    ///
    /// # Arguments
    /// * `path` - File path
    /// * `schema` - Record layout, one member per logical field, exactly one key
    /// * `options` - Loading behaviour
    ///
    /// # Errors
    /// Returns an error if:
    /// - File cannot be read
    /// - The signature is unknown or a section lies outside the file
    /// - The schema doesn't match the file's field metadata or record size
    pub fn open(path: impl AsRef<Path>, schema: Schema, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database file: {}", path.display());
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes, schema, options)
    }

    /// Parses a file already held in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, schema: Schema, options: ReaderOptions) -> Result<Self> {
        let bytes = bytes.into();
        let (format, context) = {
            let mut reader = BitReader::from_slice(&bytes);
            format::open(&mut reader, &schema, &options)?
        };
        if context.is_none() {
            info!("{} file is empty", format);
        }
        Ok(Self {
            bytes,
            schema,
            options,
            format,
            context,
        })
    }

    pub fn format(&self) -> FormatVersion {
        self.format
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// The parsed layout; `None` for an empty file.
    pub fn layout(&self) -> Option<&Layout> {
        self.context.as_ref().map(DecodeContext::layout)
    }

    /// One descriptor per schema member; empty for an empty file.
    pub fn fields(&self) -> &[FieldDescriptor] {
        self.context.as_ref().map(DecodeContext::fields).unwrap_or_default()
    }

    pub fn context(&self) -> Option<&DecodeContext> {
        self.context.as_ref()
    }

    /// Number of primary records, copies excluded.
    pub fn record_count(&self) -> usize {
        self.context.as_ref().map_or(0, DecodeContext::primary_count)
    }

    /// Number of copy-table aliases.
    pub fn copy_count(&self) -> usize {
        self.context.as_ref().map_or(0, |ctx| ctx.copy_table().len())
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Every record: primary records in file order, then copy-table aliases.
    ///
    /// Yields nothing when the options disable record loading.
    pub fn records(&self) -> RecordIterator<'_> {
        let ctx = self.context.as_ref().filter(|_| self.options.load_records);
        RecordIterator::new(&self.bytes, ctx, &self.schema)
    }

    /// Every string of the pool with its offset relative to the pool start.
    ///
    /// Yields nothing unless `load_string_pool` is set and the file has a pool.
    pub fn strings(&self) -> StringPoolIterator<'_> {
        let pool = match &self.context {
            Some(ctx) if self.options.load_string_pool => ctx.layout().string_pool,
            Some(ctx) if ctx.layout().string_pool.exists => {
                warn!("String pool scan requested without load_string_pool");
                Section::default()
            }
            _ => Section::default(),
        };
        StringPoolIterator::new(&self.bytes, pool)
    }

    /// Decodes every record into a map keyed by record key.
    pub fn load(&self) -> Result<BTreeMap<RecordKey, Record>> {
        self.records().collect()
    }

    /// Decodes the primary record at `ordinal` with a fresh cursor.
    ///
    /// Returns `Ok(None)` past the last primary record. Copies aren't reachable
    /// by ordinal.
    pub fn record_at(&self, ordinal: usize) -> Result<Option<(RecordKey, Record)>> {
        let Some(ctx) = &self.context else {
            return Ok(None);
        };
        let Some(slot) = ctx.slot(ordinal) else {
            return Ok(None);
        };
        let mut reader = BitReader::from_slice(&self.bytes);
        RecordDecoder::new(ctx, &self.schema)
            .decode(&mut reader, slot.location, slot.key)
            .map(Some)
    }
}
