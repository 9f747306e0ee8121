//! Lazy iterators over a loaded file.
//!
//! [`RecordIterator`] runs two passes over one cursor:
//!
//! ```text
//! Primary(ordinal) ──► every primary record, filling the offset map
//!        │
//!        ▼
//! Copies(entry)    ──► each copy-table alias, replayed from the offset map
//!        │
//!        ▼
//!      Done          (also entered after the first error)
//! ```

use std::io::Cursor;
use std::iter::FusedIterator;

use log::{debug, info};

use crate::dbfile::codec::BitReader;
use crate::dbfile::decode::{DecodeContext, RecordDecoder};
use crate::dbfile::sections::offset_map::OffsetMap;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::Section;
use crate::dbfile::types::schema::Schema;
use crate::dbfile::types::value::{Record, RecordKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Primary(usize),
    Copies(usize),
    Done,
}

/// Yields `(key, record)` pairs: primary records in file order, then copies.
pub struct RecordIterator<'a> {
    reader: BitReader<Cursor<&'a [u8]>>,
    ctx: Option<&'a DecodeContext>,
    schema: &'a Schema,
    offsets: OffsetMap,
    phase: Phase,
}

impl<'a> RecordIterator<'a> {
    /// Iterates `ctx`'s records; `None` yields nothing.
    pub(crate) fn new(bytes: &'a [u8], ctx: Option<&'a DecodeContext>, schema: &'a Schema) -> Self {
        Self {
            reader: BitReader::from_slice(bytes),
            ctx,
            schema,
            offsets: OffsetMap::new(),
            phase: if ctx.is_some() { Phase::Primary(0) } else { Phase::Done },
        }
    }

    /// Locations of every primary record decoded so far.
    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    fn fail(&mut self, err: DbError) -> Option<Result<(RecordKey, Record)>> {
        self.phase = Phase::Done;
        Some(Err(err))
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = Result<(RecordKey, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        let ctx = self.ctx?;
        let decoder = RecordDecoder::new(ctx, self.schema);

        loop {
            match self.phase {
                Phase::Done => return None,
                Phase::Primary(ordinal) => {
                    let Some(slot) = ctx.slot(ordinal) else {
                        debug!(
                            "Primary pass done: {} records, {} copies pending",
                            ordinal,
                            ctx.copy_table.len()
                        );
                        self.phase = Phase::Copies(0);
                        continue;
                    };
                    self.phase = Phase::Primary(ordinal + 1);
                    return match decoder.decode(&mut self.reader, slot.location, slot.key) {
                        Ok((key, record)) => {
                            self.offsets.insert(key, slot.location);
                            Some(Ok((key, record)))
                        }
                        Err(err) => self.fail(err),
                    };
                }
                Phase::Copies(i) => {
                    let Some(&entry) = ctx.copy_table.entries().get(i) else {
                        info!("Decoded {} records and {} copies", self.offsets.len(), i);
                        self.phase = Phase::Done;
                        return None;
                    };
                    self.phase = Phase::Copies(i + 1);
                    let Some(location) = self.offsets.get(entry.old_key) else {
                        return self.fail(DbError::UnknownOldKey {
                            new_key: entry.new_key,
                            old_key: entry.old_key,
                        });
                    };
                    return match decoder.decode_copy(&mut self.reader, location, entry) {
                        Ok(item) => Some(Ok(item)),
                        Err(err) => self.fail(err),
                    };
                }
            }
        }
    }
}

impl FusedIterator for RecordIterator<'_> {}

/// Yields `(relative_offset, string)` for every NUL-terminated string in the pool.
pub struct StringPoolIterator<'a> {
    reader: BitReader<Cursor<&'a [u8]>>,
    pool: Section,
    pending: Option<DbError>,
    done: bool,
}

impl<'a> StringPoolIterator<'a> {
    /// Scans `pool`; a pool that doesn't exist yields nothing.
    pub(crate) fn new(bytes: &'a [u8], pool: Section) -> Self {
        let mut reader = BitReader::from_slice(bytes);
        let pending = if pool.exists { reader.seek(pool.start).err() } else { None };
        Self {
            reader,
            pool,
            pending,
            done: !pool.exists,
        }
    }
}

impl Iterator for StringPoolIterator<'_> {
    type Item = Result<(u32, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }
        if self.done || self.reader.position() >= self.pool.end() {
            self.done = true;
            return None;
        }

        let offset = (self.reader.position() - self.pool.start) as u32;
        match self.reader.read_cstring() {
            Ok(value) => Some(Ok((offset, value))),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for StringPoolIterator<'_> {}
