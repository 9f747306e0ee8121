//! Codec layer: the primitive reader every parser and resolver reads through.
//!
//! # Submodules
//!
//! - [`bit_reader`][]: byte- and bit-aligned reads with a seek-resetting bit cursor

pub mod bit_reader;

pub use bit_reader::BitReader;
