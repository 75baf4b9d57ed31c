//! 128-bit component identifiers and name hashes.

use std::fmt;

use sha2::{Digest, Sha256};

/// A 16-byte UUID identifier.
///
/// Unique per component type; the nil id means "unset".
pub type Id = [u8; 16];

/// The zero/nil UUID.
pub const NIL_ID: Id = [0u8; 16];

/// Returns true for the nil id.
#[inline]
pub fn is_nil(id: &Id) -> bool {
    *id == NIL_ID
}

/// Generates a fresh random (version 4) id.
pub fn new_id() -> Id {
    uuid::Uuid::new_v4().into_bytes()
}

/// Derives a UUIDv8 from input bytes using SHA-256.
///
/// ```text
/// hash = SHA-256(input_bytes)[0:16]
/// hash[6] = (hash[6] & 0x0F) | 0x80  // version 8
/// hash[8] = (hash[8] & 0x3F) | 0x80  // RFC 4122 variant
/// ```
pub fn derived_id(input: &[u8]) -> Id {
    let hash = Sha256::digest(input);
    let mut id = [0u8; 16];
    id.copy_from_slice(&hash[..16]);

    id[6] = (id[6] & 0x0F) | 0x80;
    id[8] = (id[8] & 0x3F) | 0x80;

    id
}

/// Formats an id as hyphenated lowercase hex.
pub fn format_id(id: &Id) -> String {
    uuid::Uuid::from_bytes(*id).hyphenated().to_string()
}

/// Parses an id from hex (with or without hyphens).
pub fn parse_id(s: &str) -> Option<Id> {
    uuid::Uuid::parse_str(s).ok().map(|u| u.into_bytes())
}

/// Hash of a component name within its scope.
///
/// `SHA-256(parent_id || utf8(name))[0:20]`. Comparison is exact and
/// case-sensitive. The empty name hashes to [`NameHash::EMPTY`]
/// regardless of scope, so unnamed components never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameHash([u8; 20]);

impl NameHash {
    /// Hash of the empty name.
    pub const EMPTY: NameHash = NameHash([0u8; 20]);

    /// Hashes `name` scoped by `parent_id`.
    pub fn new(parent_id: &Id, name: &str) -> NameHash {
        if name.is_empty() {
            return NameHash::EMPTY;
        }
        let mut hasher = Sha256::new();
        hasher.update(parent_id);
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[..20]);
        NameHash(bytes)
    }

    /// Returns true for the hash of the empty name.
    pub fn is_empty(&self) -> bool {
        *self == NameHash::EMPTY
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Default for NameHash {
    fn default() -> Self {
        NameHash::EMPTY
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash(")?;
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_unique_and_not_nil() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(!is_nil(&a));
    }

    #[test]
    fn test_derived_id_version_and_variant() {
        let id = derived_id(b"test");
        assert_eq!(id[6] & 0xF0, 0x80);
        assert_eq!(id[8] & 0xC0, 0x80);
        assert_eq!(id, derived_id(b"test"));
        assert_ne!(id, derived_id(b"other"));
    }

    #[test]
    fn test_format_parse_roundtrip() {
        let id = derived_id(b"layer");
        let formatted = format_id(&id);
        assert_eq!(formatted.len(), 36);
        assert_eq!(parse_id(&formatted), Some(id));
        assert_eq!(parse_id(&formatted.replace('-', "")), Some(id));
        assert_eq!(parse_id("not an id"), None);
    }

    #[test]
    fn test_name_hash_scoped_and_case_sensitive() {
        let parent = [7u8; 16];
        assert_eq!(NameHash::new(&parent, "Base"), NameHash::new(&parent, "Base"));
        assert_ne!(NameHash::new(&parent, "Base"), NameHash::new(&parent, "base"));
        assert_ne!(NameHash::new(&parent, "Base"), NameHash::new(&NIL_ID, "Base"));
    }

    #[test]
    fn test_empty_name_hash() {
        assert!(NameHash::new(&[3u8; 16], "").is_empty());
        assert!(!NameHash::new(&NIL_ID, "x").is_empty());
    }
}
