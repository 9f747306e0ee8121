//! File format parsing layer.
//!
//! This module bridges raw bytes and the record decoder: it detects the
//! container variant, parses its header into a [`Layout`], builds the field
//! descriptors and loads every section resolver the decoder consults.
//!
//! # Module Organization
//!
//! - [`signature`]: maps the 4-byte tag to a [`FormatVersion`]
//! - [`header`]: one [`FormatReader`] per variant
//! - [`fields`]: field descriptor construction and record-size checks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Signature       │ ← signature::detect()
//! ├──────────────────┤
//! │  Fixed header    │ ← FormatReader::parse_header()
//! │  Field metadata  │
//! ├──────────────────┤
//! │  Records         │ ← decoded lazily from the DecodeContext
//! ├──────────────────┤
//! │  Sections        │ ← FormatReader::load_records()
//! │  (index, copy,   │
//! │   pallet, common)│
//! └──────────────────┘
//! ```

use std::io::{Read, Seek};

use log::{debug, info};

use crate::dbfile::codec::BitReader;
use crate::dbfile::decode::DecodeContext;
use crate::dbfile::sections::common::CommonDataTable;
use crate::dbfile::sections::copy_table::CopyTable;
use crate::dbfile::sections::index_table::IndexTable;
use crate::dbfile::sections::offset_map;
use crate::dbfile::sections::pallet::Pallet;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::{FieldDescriptor, FormatVersion, Layout, ReaderOptions};
use crate::dbfile::types::schema::{Arity, Schema};

pub mod fields;
pub mod header;
pub mod signature;

use header::{HeaderData, ParsedHeader};
use header::{wdb2::Wdb2, wdb5::Wdb5, wdb6::Wdb6, wdbc::Wdbc, wdc1::Wdc1};

/// The capability every container variant implements.
///
/// Variants are siblings: shared behaviour lives in the provided
/// [`load_records`](FormatReader::load_records) and in the section resolvers,
/// never in another variant.
pub trait FormatReader {
    const VERSION: FormatVersion;

    /// Consumes the header following the signature, plus per-field metadata.
    fn parse_header<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<ParsedHeader>;

    /// Builds one descriptor per schema member.
    fn describe_fields(header: &HeaderData, schema: &Schema) -> Result<Vec<FieldDescriptor>>;

    /// Checks the declared record size against the descriptors.
    fn verify_record_size(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()>;

    /// Loads the common-data table; variants without one keep the empty default.
    fn load_common_data<R: Read + Seek>(
        _reader: &mut BitReader<R>,
        _layout: &Layout,
        _fields: &[FieldDescriptor],
        _schema: &Schema,
    ) -> Result<CommonDataTable> {
        Ok(CommonDataTable::default())
    }

    /// Prepares record loading: descriptors, the record-size check and every
    /// section resolver. Records themselves are decoded lazily from the
    /// returned context.
    fn load_records<R: Read + Seek>(
        reader: &mut BitReader<R>,
        header: HeaderData,
        schema: &Schema,
        options: &ReaderOptions,
    ) -> Result<DecodeContext> {
        let key_index = schema.key_index()?;
        let key_member = &schema.members()[key_index];
        if key_member.arity != Arity::Scalar || !key_member.ty.is_integer() {
            return Err(DbError::UnsupportedFieldType {
                field: key_member.name.clone(),
                ty: key_member.ty.name(),
                kind: "record key",
            });
        }

        let fields = Self::describe_fields(&header, schema)?;
        debug!("{} field descriptors built for {}", fields.len(), Self::VERSION);
        if options.verify_record_size {
            Self::verify_record_size(&header.layout, &fields)?;
        }

        let layout = header.layout;
        let index_table = IndexTable::load(reader, &layout.index_table, layout.record_count)?;
        let variable_slots = offset_map::load_slots(reader, &layout.offset_map, layout.min_key)?;
        let copy_table = CopyTable::load(reader, &layout.copy_table)?;
        let pallet = Pallet::load(reader, &layout.pallet)?;
        let common = Self::load_common_data(reader, &layout, &fields, schema)?;

        info!(
            "{} ready: {} records, {} copies, {} pallet words, {} common-data columns",
            Self::VERSION,
            if layout.has_variable_records() { variable_slots.len() } else { layout.record_count as usize },
            copy_table.len(),
            pallet.len(),
            common.column_count()
        );

        Ok(DecodeContext {
            layout,
            fields,
            key_index,
            index_table,
            variable_slots,
            copy_table,
            pallet,
            common,
        })
    }
}

/// Detects the variant and prepares decoding.
///
/// Returns `None` as the context for an intentionally empty file.
pub fn open<R: Read + Seek>(
    reader: &mut BitReader<R>,
    schema: &Schema,
    options: &ReaderOptions,
) -> Result<(FormatVersion, Option<DecodeContext>)> {
    let version = signature::detect(reader)?;
    let context = match version {
        FormatVersion::Wdbc => prepare::<Wdbc, R>(reader, schema, options)?,
        FormatVersion::Wdb2 => prepare::<Wdb2, R>(reader, schema, options)?,
        FormatVersion::Wdb5 => prepare::<Wdb5, R>(reader, schema, options)?,
        FormatVersion::Wdb6 => prepare::<Wdb6, R>(reader, schema, options)?,
        FormatVersion::Wdc1 => prepare::<Wdc1, R>(reader, schema, options)?,
    };
    Ok((version, context))
}

fn prepare<F: FormatReader, R: Read + Seek>(
    reader: &mut BitReader<R>,
    schema: &Schema,
    options: &ReaderOptions,
) -> Result<Option<DecodeContext>> {
    match F::parse_header(reader)? {
        ParsedHeader::Empty => Ok(None),
        ParsedHeader::Populated(header) => {
            header.layout.validate(reader.len())?;
            F::load_records(reader, header, schema, options).map(Some)
        }
    }
}
