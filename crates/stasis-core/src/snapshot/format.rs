//! Snapshot file envelope
//!
//! Persisted snapshots wrap the graph buffer in a small header:
//!
//! ```text
//! magic: [u8; 4] = "STSN"
//! version: u32
//! flags: u32 (reserved, 0)
//! checksum: u32 (CRC32 of payload)
//! payload: graph buffer
//! ```

use super::io::{BufferReader, BufferWriter};
use crate::error::{SnapshotError, SnapshotResult};

/// Magic number for snapshot files
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"STSN";

/// Current envelope format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Size of the envelope header in bytes
pub const HEADER_SIZE: usize = 16;

/// Decoded envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version
    pub version: u32,
    /// Reserved flags
    pub flags: u32,
    /// CRC32 of the payload
    pub checksum: u32,
}

/// Wrap a graph buffer in the envelope
pub fn seal(payload: &[u8]) -> Vec<u8> {
    let mut writer = BufferWriter::with_capacity(HEADER_SIZE + payload.len());
    writer.write_raw(&SNAPSHOT_MAGIC);
    writer.write_u32(SNAPSHOT_VERSION);
    writer.write_u32(0);
    writer.write_u32(crc32fast::hash(payload));
    writer.write_raw(payload);
    writer.into_bytes()
}

/// Read and check the envelope header
pub fn read_header(bytes: &[u8]) -> SnapshotResult<SnapshotHeader> {
    let mut reader = BufferReader::new(bytes);

    let mut magic = [0u8; 4];
    magic.copy_from_slice(reader.read_raw(4)?);
    if magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic(magic));
    }

    let version = reader.read_u32()?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            expected: SNAPSHOT_VERSION,
            actual: version,
        });
    }

    Ok(SnapshotHeader {
        version,
        flags: reader.read_u32()?,
        checksum: reader.read_u32()?,
    })
}

/// Check the envelope and return the graph buffer inside it
pub fn open(bytes: &[u8]) -> SnapshotResult<&[u8]> {
    let header = read_header(bytes)?;
    let payload = &bytes[HEADER_SIZE..];
    let actual = crc32fast::hash(payload);
    if actual != header.checksum {
        return Err(SnapshotError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }
    Ok(payload)
}
