//! Archive and chunk versions.

use std::fmt;

use crate::error::ReadError;
use crate::limits::MIN_ARCHIVE_VERSION;

/// Archive schema generations.
///
/// The numeric value is what the archive header stores. Writers may
/// target any generation; readers accept any value at or above
/// [`MIN_ARCHIVE_VERSION`] and interpret values newer than the newest
/// known generation with the newest known layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ArchiveVersion {
    /// 32-bit chunk lengths, index-based cross references.
    V4 = 40,
    /// 64-bit chunk lengths, id-based cross references.
    V5 = 50,
    /// Linked instance definitions, style overrides, history records.
    V6 = 60,
    /// Tagged optional items in component records.
    V7 = 70,
    V8 = 80,
}

impl ArchiveVersion {
    /// The generation written by default.
    pub const CURRENT: ArchiveVersion = ArchiveVersion::V8;

    /// All generations, oldest first.
    pub const ALL: [ArchiveVersion; 5] = [
        ArchiveVersion::V4,
        ArchiveVersion::V5,
        ArchiveVersion::V6,
        ArchiveVersion::V7,
        ArchiveVersion::V8,
    ];

    /// Maps a stored version number onto the generation whose layout it uses.
    pub fn from_i32(version: i32) -> Result<ArchiveVersion, ReadError> {
        match version {
            v if v < MIN_ARCHIVE_VERSION => Err(ReadError::UnsupportedArchiveVersion { version }),
            40..=49 => Ok(ArchiveVersion::V4),
            50..=59 => Ok(ArchiveVersion::V5),
            60..=69 => Ok(ArchiveVersion::V6),
            70..=79 => Ok(ArchiveVersion::V7),
            _ => Ok(ArchiveVersion::V8),
        }
    }

    /// Returns the stored version number.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns the width in bytes of chunk length prefixes.
    pub fn length_width(self) -> usize {
        if self < ArchiveVersion::V5 { 4 } else { 8 }
    }
}

impl Default for ArchiveVersion {
    fn default() -> Self {
        ArchiveVersion::CURRENT
    }
}

impl fmt::Display for ArchiveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_i32())
    }
}

/// The `(major, minor)` pair carried by a versioned chunk.
///
/// A major bump is a structural break; minor bumps only append fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkVersion {
    pub major: i32,
    pub minor: i32,
}

impl ChunkVersion {
    pub const fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ChunkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_i32_ranges() {
        assert_eq!(ArchiveVersion::from_i32(40).unwrap(), ArchiveVersion::V4);
        assert_eq!(ArchiveVersion::from_i32(57).unwrap(), ArchiveVersion::V5);
        assert_eq!(ArchiveVersion::from_i32(80).unwrap(), ArchiveVersion::V8);
        assert_eq!(ArchiveVersion::from_i32(120).unwrap(), ArchiveVersion::V8);
        assert!(matches!(
            ArchiveVersion::from_i32(3),
            Err(ReadError::UnsupportedArchiveVersion { version: 3 })
        ));
    }

    #[test]
    fn test_length_width() {
        assert_eq!(ArchiveVersion::V4.length_width(), 4);
        assert_eq!(ArchiveVersion::V5.length_width(), 8);
        assert_eq!(ArchiveVersion::CURRENT.length_width(), 8);
    }

    #[test]
    fn test_ordering() {
        assert!(ArchiveVersion::V4 < ArchiveVersion::V6);
        assert!(ChunkVersion::new(1, 3) > ChunkVersion::new(1, 1));
    }
}
