//! Container signature detection.

use std::io::{Read, Seek};

use log::info;

use crate::dbfile::codec::BitReader;
use crate::dbfile::types::error::Result;
use crate::dbfile::types::models::FormatVersion;

/// Reads the 4-byte signature and maps it to a [`FormatVersion`].
///
/// Advances the reader by exactly 4 bytes.
///
/// # Errors
/// `UnknownSignature` for any tag outside the five known variants,
/// `UnexpectedEof` if the stream is shorter than 4 bytes.
pub fn detect<R: Read + Seek>(reader: &mut BitReader<R>) -> Result<FormatVersion> {
    let bytes = reader.read_bytes(4)?;
    let signature = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let version = FormatVersion::try_from(signature)?;
    info!("Detected {} container ({} bytes)", version, reader.len());
    Ok(version)
}
