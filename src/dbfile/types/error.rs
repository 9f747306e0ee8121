//! Custom error types for the dbfile-reader crate.

use std::io;
use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Variants fall into two families. Schema errors mean the caller-supplied
/// [`Schema`](crate::Schema) does not describe the file; corruption errors mean
/// the file itself is broken. See [`DbError::is_schema_error`] and
/// [`DbError::is_corruption`].
#[derive(Debug, Error)]
pub enum DbError {
    /// An I/O error other than a short read.
    #[error("I/O error: {0:?}")]
    Io(io::Error),

    /// The first four bytes do not name a known container variant.
    #[error("Unknown file signature {0:02x?}")]
    UnknownSignature([u8; 4]),

    /// A read would run past the end of the byte source.
    #[error("Unexpected end of stream at byte {position}")]
    UnexpectedEof { position: u64 },

    /// A bit-level read was asked for a width outside `0..=64`.
    #[error("Invalid bit width {0}, expected a value between 0 and 64")]
    InvalidBitWidth(i64),

    /// The record size (or field count) declared by the file does not match the one computed from the schema.
    #[error("Structure size mismatch: file declares {declared}, schema computes {computed}")]
    StructureSizeMismatch { declared: u32, computed: u32 },

    /// The last member is an array whose length cannot be inferred and was not declared.
    #[error("Array length of field '{field}' can't be guessed; declare it in the schema")]
    MissingArraySizeDeclaration { field: String },

    /// A member's declared shape contradicts the file metadata.
    #[error("Field '{field}' has array length {found} in the file, but the schema declares {declared}")]
    InvalidArraySize { field: String, declared: u32, found: u32 },

    /// More than one schema member is marked as the record key.
    #[error("Schema declares more than one key member")]
    MultipleIndexFields,

    /// No schema member is marked as the record key.
    #[error("Schema declares no key member")]
    MissingIndexField,

    /// A field's storage kind can not be decoded into the member's element type.
    #[error("Field '{field}' of type {ty} can't be stored as {kind}")]
    UnsupportedFieldType {
        field: String,
        ty: &'static str,
        kind: &'static str,
    },

    /// A bit-packed field's stored signedness differs from the member's element type.
    #[error("Field '{field}' signedness contradicts the file (stored signed: {stored_signed})")]
    SignednessMismatch { field: String, stored_signed: bool },

    /// An extended field descriptor or common-data column uses an unknown storage kind.
    #[error("Unsupported compression kind {0}")]
    UnsupportedCompressionKind(u32),

    /// A record consumed more (or, for variable records, a different amount of) bytes than declared.
    #[error("Record at {record_start:#x} ends at {actual_end:#x}, expected {expected_end:#x}")]
    RecordOverrun {
        record_start: u64,
        expected_end: u64,
        actual_end: u64,
    },

    /// A copy-table entry references a key that no primary record carries.
    #[error("Copy table references unknown key {old_key} (aliased as {new_key})")]
    UnknownOldKey { new_key: u32, old_key: u32 },

    /// A section declared by the header does not fit in the byte source.
    #[error("Section '{section}' ends at {end:#x}, past the end of the stream ({stream_len:#x})")]
    SectionOutOfBounds {
        section: &'static str,
        end: u64,
        stream_len: u64,
    },
}

impl DbError {
    /// `true` when the caller's schema does not describe the file.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            DbError::StructureSizeMismatch { .. }
                | DbError::MissingArraySizeDeclaration { .. }
                | DbError::InvalidArraySize { .. }
                | DbError::MultipleIndexFields
                | DbError::MissingIndexField
                | DbError::UnsupportedFieldType { .. }
                | DbError::SignednessMismatch { .. }
        )
    }

    /// `true` when the file itself is malformed.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            DbError::UnknownSignature(_)
                | DbError::UnexpectedEof { .. }
                | DbError::RecordOverrun { .. }
                | DbError::UnknownOldKey { .. }
                | DbError::SectionOutOfBounds { .. }
                | DbError::UnsupportedCompressionKind(_)
                | DbError::InvalidBitWidth(_)
        )
    }
}

impl From<io::Error> for DbError {
    fn from(err: io::Error) -> Self {
        // Short reads carry no position here; the primitive reader rewrites them with one.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DbError::UnexpectedEof { position: 0 }
        } else {
            DbError::Io(err)
        }
    }
}

/// A convenience `Result` type alias using the crate's `DbError` type.
pub type Result<T> = std::result::Result<T, DbError>;
