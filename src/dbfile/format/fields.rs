//! Field metadata builder.
//!
//! Turns the file's per-field metadata and the caller's schema into one
//! [`FieldDescriptor`] per schema member. Three sources exist:
//!
//! - WDBC / WDB2 store nothing: members are packed back to back with their
//!   schema widths ([`from_schema`]).
//! - WDB5 / WDB6 store `(bit_width, offset)` pairs; byte size is
//!   `(32 - bit_width) / 8` and array lengths are inferred ([`from_raw`]).
//! - WDC1 adds an extended descriptor per stored field carrying bit offset,
//!   bit size and compression kind ([`from_extended`]).
//!
//! Array length is resolved in this order:
//!
//! 1. an array size carried by the compression kind (`BitpackedIndexedArray`);
//! 2. the distance to the next field's offset divided by this field's byte size;
//! 3. for the last field: when the file's largest and smallest byte sizes are
//!    equal there is no padding, so the remaining record bytes divided by the
//!    byte size; otherwise the schema's declared length, or
//!    `MissingArraySizeDeclaration` when there is none.
//!
//! The key member is always a single element. When the file carries an index
//! table and the schema lists one member more than the file stores, the key
//! member has no metadata entry and takes its value from the index table.

use std::cmp::Ordering;

use log::{debug, trace};

use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::{
    CompressionKind, ExtendedFieldMeta, FieldDescriptor, Layout, RawFieldMeta,
};
use crate::dbfile::types::schema::{Arity, ElementType, Member, Schema};
use crate::dbfile::utils;

/// Descriptors for variants without stored field metadata.
pub fn from_schema(layout: &Layout, schema: &Schema) -> Result<Vec<FieldDescriptor>> {
    let members = schema.members();
    let largest = members.iter().map(|m| m.ty.byte_size()).max().unwrap_or(0);
    let smallest = members.iter().map(|m| m.ty.byte_size()).min().unwrap_or(0);

    let mut descriptors = Vec::with_capacity(members.len());
    let mut offset = 0u32;
    for (i, member) in members.iter().enumerate() {
        let byte_size = member.ty.byte_size();
        let is_last = i + 1 == members.len();
        let array_length = match member.arity {
            Arity::Scalar => 1,
            Arity::Array { len: Some(len) } => len,
            Arity::Array { len: None } if is_last && largest == smallest && layout.record_size > offset => {
                (layout.record_size - offset) / byte_size
            }
            Arity::Array { len: None } => {
                return Err(DbError::MissingArraySizeDeclaration {
                    field: member.name.clone(),
                });
            }
        };

        let descriptor = FieldDescriptor::plain(&member.name, byte_size, offset, array_length);
        trace!("Field {:?}", descriptor);
        offset += descriptor.span();
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

/// Descriptors for WDB5 and WDB6 from `(bit_width, offset)` pairs.
///
/// WDB6 members past the stored `field_count` become `CommonData` fields with a zero default.
pub fn from_raw(layout: &Layout, raw: &[RawFieldMeta], schema: &Schema) -> Result<Vec<FieldDescriptor>> {
    let key_index = schema.key_index()?;
    let slots = map_members(layout, schema, key_index, layout.total_field_count as usize)?;

    let sizes = raw.iter().map(stored_byte_size).collect::<Result<Vec<_>>>()?;
    let largest = sizes.iter().copied().max().unwrap_or(0);
    let smallest = sizes.iter().copied().min().unwrap_or(0);

    let mut descriptors = Vec::with_capacity(schema.len());
    for (member_index, (member, slot)) in schema.members().iter().zip(&slots).enumerate() {
        let Some(slot) = *slot else {
            descriptors.push(FieldDescriptor::index_key(&member.name, 4));
            continue;
        };

        if slot >= raw.len() {
            let descriptor = FieldDescriptor {
                bit_size: 0,
                bit_offset: 0,
                compression: CompressionKind::CommonData { default: 0 },
                ..FieldDescriptor::plain(&member.name, member.ty.byte_size(), 0, 1)
            };
            trace!("Field {:?}", descriptor);
            descriptors.push(descriptor);
            continue;
        }

        let byte_size = sizes[slot];
        let offset = raw[slot].offset as u32;
        let array_length = if member_index == key_index {
            1
        } else if let Some(next) = raw.get(slot + 1) {
            let distance = (next.offset as u32).saturating_sub(offset) / byte_size;
            inferred_length(member, distance)?
        } else {
            last_field_length(layout, member, byte_size, offset, largest == smallest)?
        };

        let descriptor = FieldDescriptor::plain(&member.name, byte_size, offset, array_length);
        trace!("Field {:?}", descriptor);
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

/// Descriptors for WDC1 from raw pairs and extended storage info.
pub fn from_extended(
    layout: &Layout,
    raw: &[RawFieldMeta],
    extended: &[ExtendedFieldMeta],
    schema: &Schema,
) -> Result<Vec<FieldDescriptor>> {
    let key_index = schema.key_index()?;
    let slots = map_members(layout, schema, key_index, extended.len())?;

    let mut descriptors = Vec::with_capacity(schema.len());
    for (member, slot) in schema.members().iter().zip(&slots) {
        let Some(slot) = *slot else {
            descriptors.push(FieldDescriptor::index_key(&member.name, 4));
            continue;
        };

        let meta = extended[slot];
        let byte_size = match raw.get(slot) {
            Some(pair) => match pair.byte_size()? {
                0 => member.ty.byte_size(),
                n => n,
            },
            None => member.ty.byte_size(),
        };

        if member.ty == ElementType::String && meta.compression != CompressionKind::None {
            return Err(DbError::UnsupportedFieldType {
                field: member.name.clone(),
                ty: member.ty.name(),
                kind: meta.compression.name(),
            });
        }

        let array_length = match meta.compression {
            CompressionKind::None => {
                let found = (meta.bit_size as u32 / 8) / byte_size;
                declared_length(member, found.max(1))?
            }
            CompressionKind::BitpackedIndexedArray { array_size } => declared_length(member, array_size)?,
            CompressionKind::Bitpacked { signed } => {
                if member.ty.is_integer() && signed != member.ty.is_signed() {
                    return Err(DbError::SignednessMismatch {
                        field: member.name.clone(),
                        stored_signed: signed,
                    });
                }
                declared_length(member, 1)?
            }
            CompressionKind::CommonData { .. } | CompressionKind::BitpackedIndexed => declared_length(member, 1)?,
        };

        // The two pallet kinds share one pool; every other kind has its own.
        let additional_data_offset = extended[..slot]
            .iter()
            .filter(|other| other.compression.pool_class() == meta.compression.pool_class())
            .map(|other| other.additional_data_size as u64)
            .sum();

        let descriptor = FieldDescriptor {
            name: member.name.clone(),
            byte_size,
            bit_size: meta.bit_size as u32,
            offset: meta.bit_offset as u32 / 8,
            bit_offset: meta.bit_offset as u32,
            array_length,
            compression: meta.compression,
            additional_data_offset,
            additional_data_size: meta.additional_data_size,
            from_index_table: false,
        };
        trace!("Field {:?}", descriptor);
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

/// WDBC / WDB2: element count must match `field_count`, packed width must match `record_size`.
pub fn verify_packed(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()> {
    let elements: u32 = fields.iter().map(|f| f.array_length).sum();
    if elements != layout.field_count {
        return Err(DbError::StructureSizeMismatch {
            declared: layout.field_count,
            computed: elements,
        });
    }
    check_width(layout, aligned_width(fields))
}

/// WDB5 / WDB6: padded width of the stored fields must match `record_size`.
///
/// Only fixed-size records (string pool present) are checked.
pub fn verify_aligned(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()> {
    if layout.inline_strings {
        debug!("Variable records: skipping record size check");
        return Ok(());
    }
    check_width(layout, aligned_width(fields))
}

/// WDC1: the bit span of the stored fields, raw or padded, must match `record_size`.
pub fn verify_bit_span(layout: &Layout, fields: &[FieldDescriptor]) -> Result<()> {
    if layout.inline_strings {
        debug!("Variable records: skipping record size check");
        return Ok(());
    }

    let stored = fields.iter().filter(|f| f.is_in_record());
    let bits = stored.clone().map(|f| f.bit_offset + f.bit_size).max().unwrap_or(0);
    let bytes = bits.div_ceil(8);
    let largest = stored
        .filter(|f| f.compression == CompressionKind::None)
        .map(|f| f.byte_size)
        .max()
        .unwrap_or(1);
    let aligned = utils::align_up(bytes, largest);

    if layout.record_size == bytes || layout.record_size == aligned {
        debug!("Record size check passed: {} bytes", layout.record_size);
        return Ok(());
    }
    Err(DbError::StructureSizeMismatch {
        declared: layout.record_size,
        computed: aligned,
    })
}

/// Pairs each schema member with its index in the file's stored fields.
fn map_members(layout: &Layout, schema: &Schema, key_index: usize, stored: usize) -> Result<Vec<Option<usize>>> {
    let members = schema.len();
    if layout.index_table.exists && members == stored + 1 {
        if key_index != layout.index_column as usize {
            debug!(
                "Key member #{} differs from the file's index column {}",
                key_index, layout.index_column
            );
        }
        return Ok((0..members)
            .map(|m| match m.cmp(&key_index) {
                Ordering::Less => Some(m),
                Ordering::Equal => None,
                Ordering::Greater => Some(m - 1),
            })
            .collect());
    }
    if members == stored {
        return Ok((0..members).map(Some).collect());
    }
    Err(DbError::StructureSizeMismatch {
        declared: stored as u32,
        computed: members as u32,
    })
}

fn stored_byte_size(meta: &RawFieldMeta) -> Result<u32> {
    match meta.byte_size()? {
        0 => Err(DbError::InvalidBitWidth(meta.bit_width as i64)),
        n => Ok(n),
    }
}

/// Length of a non-last field whose extent comes from the next field's offset.
fn inferred_length(member: &Member, distance: u32) -> Result<u32> {
    match member.arity {
        Arity::Scalar => {
            if distance > 1 {
                trace!("Scalar field '{}' is followed by {} element slots", member.name, distance);
            }
            Ok(1)
        }
        Arity::Array { len: None } => Ok(distance.max(1)),
        Arity::Array { len: Some(len) } if len == distance => Ok(len),
        Arity::Array { len: Some(len) } => Err(DbError::InvalidArraySize {
            field: member.name.clone(),
            declared: len,
            found: distance,
        }),
    }
}

/// Length of the last stored field, using the padding heuristic.
fn last_field_length(layout: &Layout, member: &Member, byte_size: u32, offset: u32, unpadded: bool) -> Result<u32> {
    let Arity::Array { len } = member.arity else {
        return Ok(1);
    };

    if unpadded && layout.record_size > offset {
        let found = (layout.record_size - offset) / byte_size;
        return match len {
            Some(declared) if declared != found => Err(DbError::InvalidArraySize {
                field: member.name.clone(),
                declared,
                found,
            }),
            _ => Ok(found),
        };
    }

    len.ok_or_else(|| DbError::MissingArraySizeDeclaration {
        field: member.name.clone(),
    })
}

/// Length stated explicitly by the file; the schema must agree with it.
fn declared_length(member: &Member, found: u32) -> Result<u32> {
    match member.arity {
        Arity::Scalar if found == 1 => Ok(1),
        Arity::Array { len: Some(len) } if len != found => Err(DbError::InvalidArraySize {
            field: member.name.clone(),
            declared: len,
            found,
        }),
        Arity::Array { .. } => Ok(found),
        Arity::Scalar => Err(DbError::InvalidArraySize {
            field: member.name.clone(),
            declared: 1,
            found,
        }),
    }
}

/// Bytes covered by the stored plain fields, padded to the largest stored element.
fn aligned_width(fields: &[FieldDescriptor]) -> u32 {
    let stored = fields.iter().filter(|f| f.is_in_record());
    let width: u32 = stored.clone().map(FieldDescriptor::span).sum();
    let largest = stored.map(|f| f.byte_size).max().unwrap_or(1);
    utils::align_up(width, largest)
}

fn check_width(layout: &Layout, computed: u32) -> Result<()> {
    if computed != layout.record_size {
        return Err(DbError::StructureSizeMismatch {
            declared: layout.record_size,
            computed,
        });
    }
    debug!("Record size check passed: {} bytes", computed);
    Ok(())
}
