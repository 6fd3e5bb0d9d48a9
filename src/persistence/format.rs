//! Binary format definitions for prebuilt graph blobs.

use crate::error::{Result, SmallworldError};

/// Magic bytes identifying a smallworld prebuilt blob.
pub const MAGIC: [u8; 8] = *b"SWPREBLT";

/// Current format version.
///
/// Blobs are decodable only within the same major format version; a blob
/// carrying a newer version tag is rejected outright rather than decoded
/// best-effort.
pub const FORMAT_VERSION: u32 = 1;

/// Blob header structure.
///
/// Total size: 20 bytes
/// ```text
/// [MAGIC 8B][VERSION u32][PAYLOAD_LEN u32][CHECKSUM u32]
/// ```
/// All integers little-endian. `CHECKSUM` is the CRC32 of the payload that
/// follows the header.
#[derive(Debug, Clone)]
pub struct BlobHeader {
    /// Magic bytes (must be [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version.
    pub version: u32,
    /// Length of the payload following the header, in bytes.
    pub payload_len: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
}

impl BlobHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 20;

    /// Create a header for the current format version.
    pub fn new(payload_len: u32, checksum: u32) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            payload_len,
            checksum,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..12].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize and validate a header.
    ///
    /// The version tag is checked before anything that depends on the
    /// payload layout: a newer version fails with `UnsupportedVersion`, any
    /// other malformation with `CorruptPrebuilt`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(SmallworldError::corrupt_prebuilt("blob too small for header"));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        if magic != MAGIC {
            return Err(SmallworldError::corrupt_prebuilt("invalid magic bytes"));
        }

        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if version > FORMAT_VERSION {
            return Err(SmallworldError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let checksum = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);

        Ok(Self {
            magic,
            version,
            payload_len,
            checksum,
        })
    }
}
