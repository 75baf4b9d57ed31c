//! Error types for archive reading/writing, the manifest and the registry.

use thiserror::Error;

use crate::model::{ComponentType, Id};

/// Error categories reported by readers and the registry.
///
/// Every concrete error maps onto exactly one category, which is what
/// [`ReadReport`](crate::registry::ReadReport) tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// C001: The stream is not an archive or its version is unknown.
    InvalidMagic,
    /// C002: The stream ended inside a primitive or a chunk.
    TruncatedStream,
    /// C003: Chunks were opened and closed out of order.
    ChunkNestingMismatch,
    /// C004: A chunk uses a major version this reader cannot interpret.
    UnsupportedMajorVersion,
    /// C005: A component id or name collides and resolution is disabled.
    IdentityConflict,
    /// C006: A cross-reference could not be mapped to a live component.
    UnresolvedReference,
    /// C007: Structurally invalid data (bad UTF-8, bad tag, limit exceeded).
    Malformed,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "C002").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMagic => "C001",
            ErrorCode::TruncatedStream => "C002",
            ErrorCode::ChunkNestingMismatch => "C003",
            ErrorCode::UnsupportedMajorVersion => "C004",
            ErrorCode::IdentityConflict => "C005",
            ErrorCode::UnresolvedReference => "C006",
            ErrorCode::Malformed => "C007",
        }
    }
}

/// Error while reading an archive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadError {
    // === C001 ===
    #[error("[C001] invalid magic bytes: {found:?}")]
    InvalidMagic { found: [u8; 8] },

    #[error("[C001] unsupported archive version: {version}")]
    UnsupportedArchiveVersion { version: i32 },

    // === C002 ===
    #[error("[C002] unexpected end of stream while reading {context}")]
    TruncatedStream { context: &'static str },

    #[error("[C002] chunk {type_code:#010x} declares {declared} bytes but only {available} remain")]
    ChunkOverrun {
        type_code: u32,
        declared: u64,
        available: u64,
    },

    // === C003 ===
    #[error("[C003] chunk nesting mismatch: {context}")]
    ChunkNestingMismatch { context: &'static str },

    #[error("[C003] expected chunk {expected:#010x}, found {found:#010x}")]
    UnexpectedChunk { expected: u32, found: u32 },

    // === C004 ===
    #[error("[C004] chunk {type_code:#010x} has major version {major}, reader supports {supported}")]
    UnsupportedMajorVersion {
        type_code: u32,
        major: i32,
        supported: i32,
    },

    // === C005 ===
    #[error("[C005] {0}")]
    Identity(#[from] ManifestError),

    // === C007 ===
    #[error("[C007] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[C007] invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("[C007] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[C007] invalid {field} tag: {value}")]
    InvalidTag { field: &'static str, value: u32 },

    #[error("[C007] chunk {type_code:#010x} is missing its version header")]
    UnversionedChunk { type_code: u32 },

    #[error("[C007] chunk nesting exceeds maximum depth {max}")]
    ChunkDepthExceeded { max: usize },
}

impl ReadError {
    /// Returns the error category for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReadError::InvalidMagic { .. } | ReadError::UnsupportedArchiveVersion { .. } => {
                ErrorCode::InvalidMagic
            }
            ReadError::TruncatedStream { .. } | ReadError::ChunkOverrun { .. } => {
                ErrorCode::TruncatedStream
            }
            ReadError::ChunkNestingMismatch { .. } | ReadError::UnexpectedChunk { .. } => {
                ErrorCode::ChunkNestingMismatch
            }
            ReadError::UnsupportedMajorVersion { .. } => ErrorCode::UnsupportedMajorVersion,
            ReadError::Identity(e) => e.code(),
            _ => ErrorCode::Malformed,
        }
    }
}

/// Error while writing an archive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WriteError {
    #[error("chunk nesting mismatch: handle depth {handle}, open depth {open}")]
    ChunkNestingMismatch { handle: usize, open: usize },

    #[error("{open} chunk(s) still open at end of archive")]
    UnclosedChunks { open: usize },

    #[error("chunk body of {len} bytes does not fit a 32-bit length prefix")]
    ChunkTooLong { len: u64 },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("tagged item id 0 is reserved for the end marker")]
    ReservedItemId,

    #[error("{component_type} components cannot be stored in archive version {version}")]
    UnsupportedComponentType {
        component_type: ComponentType,
        version: i32,
    },
}

/// Why an identity request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// The requested id is nil.
    NilId,
    /// The requested id is already used by another component of the type.
    DuplicateId,
    /// The requested name is already used within its scope.
    DuplicateName,
    /// The type requires a name and none was given.
    EmptyName,
    /// Every non-negative index of the type is taken or retired.
    IndexExhausted,
}

/// Error raised by the manifest or manifest map.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifestError {
    #[error("identity conflict for {component_type}: {kind:?}")]
    IdentityConflict {
        component_type: ComponentType,
        kind: ConflictKind,
    },

    #[error("{component_type} component {id:?} not found")]
    NotFound { component_type: ComponentType, id: Id },

    #[error("{component_type} component {id:?} is a system component")]
    SystemComponent { component_type: ComponentType, id: Id },

    #[error("component type {component_type} cannot be catalogued")]
    InvalidType { component_type: ComponentType },

    #[error("invalid manifest map pair: {reason}")]
    InvalidMapPair { reason: &'static str },
}

impl ManifestError {
    /// Returns the error category for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ManifestError::IdentityConflict { .. } => ErrorCode::IdentityConflict,
            ManifestError::NotFound { .. } => ErrorCode::UnresolvedReference,
            _ => ErrorCode::Malformed,
        }
    }
}

/// Error raised by registry mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("component reference is empty or not owned by this registry")]
    ForeignReference,

    #[error("component {serial} is borrowed elsewhere")]
    ComponentBusy { serial: u64 },

    #[error("payload of a {expected} component was replaced by a {found} payload")]
    PayloadTypeMismatch {
        expected: ComponentType,
        found: ComponentType,
    },
}

impl RegistryError {
    /// Returns the error category for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::Manifest(e) => e.code(),
            RegistryError::ForeignReference => ErrorCode::UnresolvedReference,
            RegistryError::ComponentBusy { .. } | RegistryError::PayloadTypeMismatch { .. } => {
                ErrorCode::Malformed
            }
        }
    }
}
