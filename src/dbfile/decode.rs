//! Record decoding.
//!
//! A [`DecodeContext`] holds everything loaded from the header and the
//! section resolvers; a [`RecordDecoder`] turns one record location into a
//! `(key, Record)` pair.
//!
//! Key resolution, in order:
//!
//! 1. the key the caller already knows (copy-table replay);
//! 2. the index table entry at the record's ordinal;
//! 3. the key member read from the record bytes.
//!
//! Fixed-size records address every field absolutely from the record start.
//! Variable records are read front to back and must end exactly at their
//! declared length.

use std::io::{Read, Seek};

use log::{trace, warn};

use crate::dbfile::codec::BitReader;
use crate::dbfile::sections::common::CommonDataTable;
use crate::dbfile::sections::copy_table::{CopyEntry, CopyTable};
use crate::dbfile::sections::index_table::IndexTable;
use crate::dbfile::sections::offset_map::{RecordLocation, VariableSlot};
use crate::dbfile::sections::pallet::Pallet;
use crate::dbfile::sections::strings;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::{CompressionKind, FieldDescriptor, Layout};
use crate::dbfile::types::schema::{Arity, ElementType, Member, Schema};
use crate::dbfile::types::value::{FieldValue, Record, RecordKey};
use crate::dbfile::utils;

/// Everything record decoding needs, loaded once per file.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub(crate) layout: Layout,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) key_index: usize,
    pub(crate) index_table: Option<IndexTable>,
    pub(crate) variable_slots: Vec<VariableSlot>,
    pub(crate) copy_table: CopyTable,
    pub(crate) pallet: Pallet,
    pub(crate) common: CommonDataTable,
}

/// Where a primary record lives and, when known up front, its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSlot {
    pub location: RecordLocation,
    pub key: Option<RecordKey>,
}

impl DecodeContext {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Position of the key member in the schema.
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn index_table(&self) -> Option<&IndexTable> {
        self.index_table.as_ref()
    }

    pub fn copy_table(&self) -> &CopyTable {
        &self.copy_table
    }

    pub fn pallet(&self) -> &Pallet {
        &self.pallet
    }

    pub fn common_data(&self) -> &CommonDataTable {
        &self.common
    }

    /// Number of primary records (copies excluded).
    pub fn primary_count(&self) -> usize {
        if self.layout.has_variable_records() {
            self.variable_slots.len()
        } else {
            self.layout.record_count as usize
        }
    }

    /// Location and index-table key of the primary record at `ordinal`.
    pub fn slot(&self, ordinal: usize) -> Option<RecordSlot> {
        if ordinal >= self.primary_count() {
            return None;
        }
        let indexed = self.index_table.as_ref().and_then(|table| table.get(ordinal));

        if !self.layout.has_variable_records() {
            let start = self.layout.record_table.start + ordinal as u64 * self.layout.record_size as u64;
            return Some(RecordSlot {
                location: RecordLocation { start, length: None },
                key: indexed,
            });
        }

        let slot = self.variable_slots[ordinal];
        let key = match (&self.index_table, indexed) {
            (Some(_), Some(key)) => Some(key),
            (Some(table), None) => {
                warn!(
                    "Index table holds {} keys but record #{} exists; using offset map key {}",
                    table.len(),
                    ordinal,
                    slot.key
                );
                Some(slot.key)
            }
            (None, _) => None,
        };
        Some(RecordSlot {
            location: RecordLocation {
                start: slot.offset as u64,
                length: Some(slot.length as u32),
            },
            key,
        })
    }
}

/// Decodes records against one context and schema.
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder<'a> {
    ctx: &'a DecodeContext,
    schema: &'a Schema,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(ctx: &'a DecodeContext, schema: &'a Schema) -> Self {
        Self { ctx, schema }
    }

    /// Decodes the record at `location`.
    ///
    /// # Parameters
    /// - `known_key`: the key when it doesn't come from the record bytes
    ///   (index table or copy replay); it also selects common-data overrides.
    ///
    /// # Errors
    /// `RecordOverrun` when a fixed record reads past its size or a variable
    /// record doesn't end exactly at its declared length.
    pub fn decode<R: Read + Seek>(
        &self,
        reader: &mut BitReader<R>,
        location: RecordLocation,
        known_key: Option<RecordKey>,
    ) -> Result<(RecordKey, Record)> {
        let key = match known_key {
            Some(key) => key,
            None => self.read_inline_key(reader, location)?,
        };

        reader.seek(location.start)?;
        let members = self.schema.members();
        let mut values = Vec::with_capacity(members.len());
        for (index, (field, member)) in self.ctx.fields.iter().zip(members).enumerate() {
            let value = self.decode_field(reader, index, field, member, key, location)?;
            trace!("Record {} field '{}' = {}", key, field.name, value);
            values.push(value);
        }
        self.check_end(reader, location)?;

        let mut record = Record::new(values);
        record.set(self.ctx.key_index, self.key_value(key)?);
        Ok((key, record))
    }

    /// Replays the record found at `location` under the copy entry's new key.
    pub fn decode_copy<R: Read + Seek>(
        &self,
        reader: &mut BitReader<R>,
        location: RecordLocation,
        entry: CopyEntry,
    ) -> Result<(RecordKey, Record)> {
        let (_, mut record) = self.decode(reader, location, Some(entry.old_key))?;
        record.set(self.ctx.key_index, self.key_value(entry.new_key)?);
        trace!("Copy {} -> {}", entry.old_key, entry.new_key);
        Ok((entry.new_key, record))
    }

    fn key_value(&self, key: RecordKey) -> Result<FieldValue> {
        let member = &self.schema.members()[self.ctx.key_index];
        scalar_value(member, key as u64)
    }

    /// Reads the key member straight from the record bytes.
    fn read_inline_key<R: Read + Seek>(&self, reader: &mut BitReader<R>, location: RecordLocation) -> Result<RecordKey> {
        let field = &self.ctx.fields[self.ctx.key_index];
        let member = &self.schema.members()[self.ctx.key_index];
        if field.from_index_table {
            // The key lives only in the index table, which ran out of entries.
            return Err(DbError::UnexpectedEof {
                position: self.ctx.layout.index_table.end(),
            });
        }
        let raw = match field.compression {
            CompressionKind::None => {
                reader.seek(location.start + field.offset as u64)?;
                utils::read_unsigned(reader, field.byte_size)?
            }
            CompressionKind::Bitpacked { .. } => {
                reader.seek_bits(location.start * 8 + field.bit_offset as u64)?;
                reader.read_bits(field.bit_size as i32)?
            }
            _ => {
                return Err(DbError::UnsupportedFieldType {
                    field: member.name.clone(),
                    ty: member.ty.name(),
                    kind: field.compression.name(),
                });
            }
        };
        Ok(raw as RecordKey)
    }

    fn decode_field<R: Read + Seek>(
        &self,
        reader: &mut BitReader<R>,
        index: usize,
        field: &FieldDescriptor,
        member: &Member,
        key: RecordKey,
        location: RecordLocation,
    ) -> Result<FieldValue> {
        if field.from_index_table {
            return scalar_value(member, key as u64);
        }
        let fixed = location.length.is_none();
        let count = field.array_length.max(1);
        let mut elements = Vec::with_capacity(count as usize);

        match field.compression {
            CompressionKind::None => {
                if fixed {
                    reader.seek(location.start + field.offset as u64)?;
                }
                for _ in 0..count {
                    elements.push(self.read_plain(reader, field, member)?);
                }
            }
            CompressionKind::Bitpacked { .. } => {
                if fixed {
                    reader.seek_bits(location.start * 8 + field.bit_offset as u64)?;
                }
                for _ in 0..count {
                    let raw = reader.read_bits(field.bit_size as i32)?;
                    elements.push(integer_value(member, raw, field.bit_size)?);
                }
            }
            CompressionKind::CommonData { default } => {
                let raw = self.ctx.common.lookup(index, key).unwrap_or(default as u64);
                for _ in 0..count {
                    elements.push(self.common_value(reader, member, raw)?);
                }
            }
            CompressionKind::BitpackedIndexed | CompressionKind::BitpackedIndexedArray { .. } => {
                if fixed {
                    reader.seek_bits(location.start * 8 + field.bit_offset as u64)?;
                }
                let pallet_index = reader.read_bits(field.bit_size as i32)?;
                for k in 0..count as u64 {
                    let Some(offset) = pallet_offset(field.additional_data_offset, pallet_index, count as u64, k)
                    else {
                        return Err(DbError::UnexpectedEof {
                            position: self.ctx.layout.pallet.end(),
                        });
                    };
                    let word = self.ctx.pallet.word_at(offset)?;
                    elements.push(scalar_value(member, word as u64)?);
                }
            }
        }

        Ok(match member.arity {
            Arity::Scalar => elements.swap_remove(0),
            Arity::Array { .. } => FieldValue::Array(elements),
        })
    }

    /// One plain element at the cursor.
    fn read_plain<R: Read + Seek>(
        &self,
        reader: &mut BitReader<R>,
        field: &FieldDescriptor,
        member: &Member,
    ) -> Result<FieldValue> {
        match member.ty {
            ElementType::String => Ok(FieldValue::String(strings::read_field(reader, &self.ctx.layout)?)),
            ElementType::F32 => Ok(FieldValue::F32(reader.read_f32()?)),
            _ => {
                let raw = utils::read_unsigned(reader, field.byte_size)?;
                integer_value(member, raw, field.byte_size * 8)
            }
        }
    }

    /// A common-data value; string members hold a pool offset.
    fn common_value<R: Read + Seek>(&self, reader: &mut BitReader<R>, member: &Member, raw: u64) -> Result<FieldValue> {
        if member.ty != ElementType::String {
            return scalar_value(member, raw);
        }
        if self.ctx.layout.inline_strings {
            return Err(DbError::UnsupportedFieldType {
                field: member.name.clone(),
                ty: member.ty.name(),
                kind: "common data",
            });
        }
        strings::read_pooled(reader, &self.ctx.layout.string_pool, raw as u32).map(FieldValue::String)
    }

    fn check_end<R: Read + Seek>(&self, reader: &mut BitReader<R>, location: RecordLocation) -> Result<()> {
        let actual_end = reader.position();
        match location.length {
            None => {
                let expected_end = location.start + self.ctx.layout.record_size as u64;
                if actual_end > expected_end {
                    return Err(DbError::RecordOverrun {
                        record_start: location.start,
                        expected_end,
                        actual_end,
                    });
                }
                // Trailing padding.
                reader.seek(expected_end)
            }
            Some(length) => {
                let expected_end = location.start + length as u64;
                if actual_end != expected_end {
                    return Err(DbError::RecordOverrun {
                        record_start: location.start,
                        expected_end,
                        actual_end,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Byte offset into the pallet of element `k` of entry `index`; `None` on overflow.
fn pallet_offset(base: u64, index: u64, count: u64, k: u64) -> Option<u64> {
    index
        .checked_mul(count)?
        .checked_add(k)?
        .checked_mul(Pallet::WORD_SIZE)?
        .checked_add(base)
}

/// Builds a non-string value of the member's type from raw bits.
fn scalar_value(member: &Member, raw: u64) -> Result<FieldValue> {
    FieldValue::from_raw(member.ty, raw).ok_or_else(|| DbError::UnsupportedFieldType {
        field: member.name.clone(),
        ty: member.ty.name(),
        kind: "raw integer",
    })
}

/// Like [`scalar_value`], sign-extending from `bits` for signed members.
fn integer_value(member: &Member, raw: u64, bits: u32) -> Result<FieldValue> {
    let raw = if member.ty.is_signed() { utils::sign_extend(raw, bits) } else { raw };
    scalar_value(member, raw)
}
