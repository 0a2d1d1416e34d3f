//! Journey file format: serialized explorations with integrity checks.
//!
//! The format is a fixed header with magic bytes, version, and flags,
//! followed by a JSON-serialized exploration payload, terminated by a
//! SHA-256 content hash.
//!
//! Layout:
//!   [magic: 4 bytes "WFJ\0"] [version: 3 bytes] [flags: 1 byte]
//!   [step_count: u64 LE] [decision_count: u64 LE] [payload_len: u64 LE]
//!   [json payload: N bytes] [sha256: 32 bytes]

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::exploration::Exploration;

/// Magic bytes identifying a journey file: "WFJ\0"
pub const MAGIC: [u8; 4] = [0x57, 0x46, 0x4A, 0x00];

/// Size of the fixed header: 4 (magic) + 3 (version) + 1 (flags) + 8*3.
const HEADER_SIZE: usize = 32;

/// Size of the trailing content hash.
const HASH_SIZE: usize = 32;

/// Errors from journey file operations.
#[derive(Debug, Error)]
pub enum JourneyError {
    #[error("invalid magic bytes: expected WFJ\\0")]
    InvalidMagic,

    #[error("unsupported format version {major}.{minor}.{patch}")]
    UnsupportedVersion { major: u8, minor: u8, patch: u8 },

    #[error("content hash mismatch: file is corrupted")]
    HashMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("file too small to be a valid journey file")]
    FileTooSmall,
}

/// Journey format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JourneyVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl JourneyVersion {
    /// The current format version.
    pub const CURRENT: JourneyVersion = JourneyVersion {
        major: 0,
        minor: 1,
        patch: 0,
    };

    /// Whether this version can be read by the current implementation.
    pub fn is_compatible(&self) -> bool {
        // Pre-1.0: exact major, no newer minor
        self.major == Self::CURRENT.major && self.minor <= Self::CURRENT.minor
    }
}

impl std::fmt::Display for JourneyVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A journey file: header metadata plus the exploration.
#[derive(Debug)]
pub struct JourneyFile {
    /// Format version.
    pub version: JourneyVersion,
    /// Format flags (reserved).
    pub flags: u8,
    /// The exploration data.
    pub exploration: Exploration,
}

impl JourneyFile {
    /// Wrap an exploration for saving.
    pub fn new(exploration: Exploration) -> Self {
        Self {
            version: JourneyVersion::CURRENT,
            flags: 0,
            exploration,
        }
    }

    /// Serialize in journey binary format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JourneyError> {
        let payload = serde_json::to_vec(&self.exploration)
            .map_err(|e| JourneyError::Serialization(e.to_string()))?;

        let step_count = self.exploration.len() as u64;
        let decision_count = self.exploration.current_graph().decision_count() as u64;
        let payload_len = payload.len() as u64;

        let mut hasher = Sha256::new();

        writer.write_all(&MAGIC)?;
        hasher.update(MAGIC);

        let version = [self.version.major, self.version.minor, self.version.patch];
        writer.write_all(&version)?;
        hasher.update(version);

        writer.write_all(&[self.flags])?;
        hasher.update([self.flags]);

        for value in [step_count, decision_count, payload_len] {
            let bytes = value.to_le_bytes();
            writer.write_all(&bytes)?;
            hasher.update(bytes);
        }

        writer.write_all(&payload)?;
        hasher.update(&payload);

        let hash: [u8; 32] = hasher.finalize().into();
        writer.write_all(&hash)?;

        Ok(())
    }

    /// Serialize to a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, JourneyError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize from a reader.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, JourneyError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Deserialize from a byte slice, verifying the content hash.
    pub fn from_bytes(data: &[u8]) -> Result<Self, JourneyError> {
        if data.len() < HEADER_SIZE + HASH_SIZE {
            return Err(JourneyError::FileTooSmall);
        }

        if data[0..4] != MAGIC {
            return Err(JourneyError::InvalidMagic);
        }

        let version = JourneyVersion {
            major: data[4],
            minor: data[5],
            patch: data[6],
        };
        if !version.is_compatible() {
            return Err(JourneyError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
                patch: version.patch,
            });
        }

        let flags = data[7];

        let payload_len =
            u64::from_le_bytes(data[24..32].try_into().expect("fixed slice")) as usize;

        let expected_size = HEADER_SIZE + payload_len + HASH_SIZE;
        if data.len() < expected_size {
            return Err(JourneyError::FileTooSmall);
        }

        let payload_end = HEADER_SIZE + payload_len;
        let stored_hash = &data[payload_end..payload_end + HASH_SIZE];

        let mut hasher = Sha256::new();
        hasher.update(&data[..payload_end]);
        let computed_hash: [u8; 32] = hasher.finalize().into();

        if computed_hash != stored_hash {
            return Err(JourneyError::HashMismatch);
        }

        let exploration: Exploration = serde_json::from_slice(&data[HEADER_SIZE..payload_end])
            .map_err(|e| JourneyError::Serialization(e.to_string()))?;

        Ok(Self {
            version,
            flags,
            exploration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_graph::ZonePlacement;

    fn sample_exploration() -> Exploration {
        let mut ex = Exploration::new();
        ex.start("Start", &["east".into(), "west".into()], None, Some("Field"))
            .unwrap();
        ex.explore("east", "Meadow", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.gain_power_now("dash").unwrap();
        ex.adjust_tokens_now("coin", 3).unwrap();
        ex
    }

    #[test]
    fn round_trip() {
        let ex = sample_exploration();
        let file = JourneyFile::new(ex.clone());
        let bytes = file.to_bytes().unwrap();
        let loaded = JourneyFile::from_bytes(&bytes).unwrap();

        assert_eq!(loaded.version, JourneyVersion::CURRENT);
        assert_eq!(loaded.exploration, ex);
    }

    #[test]
    fn empty_round_trip() {
        let file = JourneyFile::new(Exploration::new());
        let bytes = file.to_bytes().unwrap();
        let loaded = JourneyFile::from_bytes(&bytes).unwrap();
        assert!(loaded.exploration.is_empty());
    }

    #[test]
    fn invalid_magic_rejected() {
        let file = JourneyFile::new(Exploration::new());
        let mut bytes = file.to_bytes().unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            JourneyFile::from_bytes(&bytes),
            Err(JourneyError::InvalidMagic)
        ));
    }

    #[test]
    fn corrupted_payload_rejected() {
        let file = JourneyFile::new(sample_exploration());
        let mut bytes = file.to_bytes().unwrap();
        let mid = HEADER_SIZE + 10;
        bytes[mid] ^= 0xFF;
        assert!(matches!(
            JourneyFile::from_bytes(&bytes),
            Err(JourneyError::HashMismatch)
        ));
    }

    #[test]
    fn truncated_rejected() {
        assert!(matches!(
            JourneyFile::from_bytes(&MAGIC),
            Err(JourneyError::FileTooSmall)
        ));
    }

    #[test]
    fn newer_version_rejected() {
        let file = JourneyFile::new(Exploration::new());
        let mut bytes = file.to_bytes().unwrap();
        // Bump the minor version byte; the hash no longer matters
        // because version checking happens first.
        bytes[5] = 99;
        assert!(matches!(
            JourneyFile::from_bytes(&bytes),
            Err(JourneyError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn write_and_read_via_io() {
        let file = JourneyFile::new(sample_exploration());
        let mut buf = Vec::new();
        file.write_to(&mut buf).unwrap();
        let loaded = JourneyFile::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.exploration.len(), 2);
    }
}
