//! Format constants and decoding limits.
//!
//! Limits bound every allocation driven by a length read from the stream.

/// Magic bytes at the start of every archive.
pub const MAGIC: &[u8; 8] = b"CADSTORE";

/// Oldest archive version this crate can read or write.
pub const MIN_ARCHIVE_VERSION: i32 = 40;

/// Maximum length of any text field in bytes.
pub const MAX_STRING_LEN: usize = 1 << 20;

/// Maximum length of an opaque byte run.
pub const MAX_BLOB_LEN: usize = 1 << 28;

/// Maximum element count of a length-prefixed array.
pub const MAX_ARRAY_LEN: usize = 1 << 20;

/// Maximum chunk nesting depth accepted by readers.
pub const MAX_CHUNK_DEPTH: usize = 32;

/// Maximum number of user string pairs.
pub const MAX_USER_STRINGS: usize = 1 << 16;

/// Counter suffixes tried when disambiguating a colliding name before
/// falling back to a random suffix.
pub const MAX_NAME_SUFFIX_ATTEMPTS: u32 = 100;

/// Removed manifest items kept before a table is compacted.
pub const MIN_COMPACTED_ITEMS: usize = 64;

/// Maximum inheritance depth followed when resolving style chains.
pub const MAX_PARENT_DEPTH: usize = 64;
