//! # dbfile-reader
//!
//! A reader for client database tables in the WDBC, WDB2, WDB5, WDB6 and WDC1
//! formats. The caller supplies a [`Schema`] describing each record; the
//! reader decodes fixed and variable records, bit-packed and pallet-compressed
//! fields, common-data overrides and copy-table aliases.
//!
//! ```no_run
//! use dbfile_reader::{DbFile, ReaderOptions, Schema};
//!
//! let schema: Schema = "id:u32:key, name:string, flags:u8[4]".parse().unwrap();
//! let file = DbFile::open("Map.db2", schema, ReaderOptions::default()).unwrap();
//! for entry in file.records() {
//!     let (key, record) = entry.unwrap();
//!     println!("{}: {}", key, record);
//! }
//! ```
pub mod dbfile;

// Re-export the main types for convenience
pub use dbfile::{
    DbFile,
    codec::BitReader,
    iter::{RecordIterator, StringPoolIterator},
    types::{
        error::{DbError, Result},
        models::{CompressionKind, FieldDescriptor, FormatVersion, Layout, ReaderOptions, Section},
        schema::{Arity, ElementType, Member, Schema, SchemaBuilder},
        value::{FieldValue, Record, RecordKey},
    },
};
