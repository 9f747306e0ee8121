//! Pallet table: a flat array of 4-byte words addressed by bit-packed indices.

use std::io::{Read, Seek};

use log::debug;

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::{DbError, Result};
use crate::dbfile::types::models::Section;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pallet {
    start: u64,
    words: Vec<u32>,
}

impl Pallet {
    pub const WORD_SIZE: u64 = 4;

    /// Reads the whole section once; an absent section yields an empty pallet.
    pub fn load<R: Read + Seek>(reader: &mut BitReader<R>, section: &Section) -> Result<Self> {
        if !section.exists {
            return Ok(Self::default());
        }

        let count = section.size as u64 / Self::WORD_SIZE;
        debug!("Loading pallet at {:#x} ({} words)", section.start, count);
        reader.seek(section.start)?;
        let words = (0..count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            start: section.start,
            words,
        })
    }

    /// The word at `byte_offset` from the start of the pallet.
    pub fn word_at(&self, byte_offset: u64) -> Result<u32> {
        self.words
            .get((byte_offset / Self::WORD_SIZE) as usize)
            .copied()
            .ok_or(DbError::UnexpectedEof {
                position: self.start.saturating_add(byte_offset),
            })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
