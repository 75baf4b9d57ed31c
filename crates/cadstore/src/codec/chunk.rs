//! Chunk protocol: nested, length-prefixed, optionally versioned records.
//!
//! Layout of one chunk:
//!
//! ```text
//! type_code: u32
//! length:    u32 (V4) or u64 (V5+), counts every byte after itself
//! [major: i32, minor: i32]   only when type_code has TCODE_VERSIONED set
//! body
//! ```
//!
//! [`ArchiveReader::end_read_chunk`] always moves to the declared end of
//! the chunk, whatever the caller consumed. Old readers stop early and
//! skip fields added later; new readers bound their reads by the length.

use crate::codec::primitives::{Reader, Writer};
use crate::codec::tcode::{TCODE_VERSIONED, is_versioned};
use crate::codec::version::{ArchiveVersion, ChunkVersion};
use crate::error::{ReadError, WriteError};
use crate::limits::{MAGIC, MAX_ARRAY_LEN, MAX_BLOB_LEN, MAX_CHUNK_DEPTH, MAX_STRING_LEN};
use crate::model::Id;

/// Item id that terminates a tagged-item list.
pub const ITEM_END: u8 = 0;

// =============================================================================
// WRITING
// =============================================================================

/// Token returned by [`ArchiveWriter::begin_write_chunk`].
///
/// Must be passed back to [`ArchiveWriter::end_write_chunk`]; closing
/// chunks out of order is reported as a nesting mismatch.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a chunk must be closed with end_write_chunk"]
pub struct ChunkHandle {
    depth: usize,
}

#[derive(Debug, Clone)]
struct OpenWriteChunk {
    length_pos: usize,
    body_start: usize,
}

/// Writes an archive: header, then nested chunks.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    out: Writer,
    version: ArchiveVersion,
    stack: Vec<OpenWriteChunk>,
}

impl ArchiveWriter {
    /// Creates a writer and emits the archive header for `version`.
    pub fn new(version: ArchiveVersion) -> Self {
        let mut out = Writer::with_capacity(4096);
        out.write_bytes(MAGIC);
        out.write_i32(version.as_i32());
        Self {
            out,
            version,
            stack: Vec::new(),
        }
    }

    /// Returns the target archive version.
    pub fn version(&self) -> ArchiveVersion {
        self.version
    }

    /// Returns the number of open chunks.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the number of bytes written so far.
    pub fn position(&self) -> usize {
        self.out.len()
    }

    /// Opens a versioned chunk and reserves its length prefix.
    pub fn begin_write_chunk(&mut self, type_code: u32, version: ChunkVersion) -> ChunkHandle {
        let handle = self.open_chunk(type_code | TCODE_VERSIONED);
        self.out.write_i32(version.major);
        self.out.write_i32(version.minor);
        handle
    }

    /// Opens a chunk without a version pair.
    pub fn begin_write_plain_chunk(&mut self, type_code: u32) -> ChunkHandle {
        self.open_chunk(type_code & !TCODE_VERSIONED)
    }

    fn open_chunk(&mut self, type_code: u32) -> ChunkHandle {
        self.out.write_u32(type_code);
        let length_pos = self.out.len();
        match self.version.length_width() {
            4 => self.out.write_u32(0),
            _ => self.out.write_u64(0),
        }
        self.stack.push(OpenWriteChunk {
            length_pos,
            body_start: self.out.len(),
        });
        ChunkHandle {
            depth: self.stack.len(),
        }
    }

    /// Closes the chunk identified by `handle` and patches its length.
    ///
    /// Chunks opened inside `handle` and left open are closed first so
    /// that every enclosing chunk stays well formed; the call still
    /// reports the mismatch.
    pub fn end_write_chunk(&mut self, handle: ChunkHandle) -> Result<(), WriteError> {
        let open = self.stack.len();
        if handle.depth == 0 || handle.depth > open {
            return Err(WriteError::ChunkNestingMismatch {
                handle: handle.depth,
                open,
            });
        }

        let mut result = Ok(());
        while self.stack.len() >= handle.depth {
            let Some(chunk) = self.stack.pop() else { break };
            if let Err(e) = self.patch_length(&chunk) {
                result = result.and(Err(e));
            }
        }

        if handle.depth != open {
            return Err(WriteError::ChunkNestingMismatch {
                handle: handle.depth,
                open,
            });
        }
        result
    }

    fn patch_length(&mut self, chunk: &OpenWriteChunk) -> Result<(), WriteError> {
        let len = (self.out.len() - chunk.body_start) as u64;
        match self.version.length_width() {
            4 => {
                let len32 = u32::try_from(len).map_err(|_| WriteError::ChunkTooLong { len })?;
                self.out.patch_u32(chunk.length_pos, len32);
            }
            _ => self.out.patch_u64(chunk.length_pos, len),
        }
        Ok(())
    }

    /// Writes a versioned chunk whose body is produced by `body`.
    ///
    /// The chunk is closed even when `body` fails.
    pub fn write_chunk<F>(&mut self, type_code: u32, version: ChunkVersion, body: F) -> Result<(), WriteError>
    where
        F: FnOnce(&mut Self) -> Result<(), WriteError>,
    {
        let handle = self.begin_write_chunk(type_code, version);
        let result = body(self);
        let end = self.end_write_chunk(handle);
        result.and(end)
    }

    /// Returns the archive bytes. Fails if any chunk is still open.
    pub fn finish(self) -> Result<Vec<u8>, WriteError> {
        if !self.stack.is_empty() {
            return Err(WriteError::UnclosedChunks {
                open: self.stack.len(),
            });
        }
        Ok(self.out.into_bytes())
    }

    // --- primitives ---------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) {
        self.out.write_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.out.write_bool(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.out.write_i32(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.out.write_u32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.out.write_i64(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.out.write_u64(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.out.write_f64(value);
    }

    pub fn write_id(&mut self, id: &Id) {
        self.out.write_id(id);
    }

    /// Writes a length-prefixed string, rejecting oversized text.
    pub fn write_string(&mut self, field: &'static str, s: &str) -> Result<(), WriteError> {
        check_len(field, s.len(), MAX_STRING_LEN)?;
        self.out.write_string(s);
        Ok(())
    }

    /// Writes a length-prefixed byte run, rejecting oversized data.
    pub fn write_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<(), WriteError> {
        check_len(field, bytes.len(), MAX_BLOB_LEN)?;
        self.out.write_bytes_prefixed(bytes);
        Ok(())
    }

    pub fn write_id_vec(&mut self, field: &'static str, ids: &[Id]) -> Result<(), WriteError> {
        check_len(field, ids.len(), MAX_ARRAY_LEN)?;
        self.out.write_id_vec(ids);
        Ok(())
    }

    pub fn write_f64_vec(&mut self, field: &'static str, values: &[f64]) -> Result<(), WriteError> {
        check_len(field, values.len(), MAX_ARRAY_LEN)?;
        self.out.write_f64_vec(values);
        Ok(())
    }

    // --- tagged items -------------------------------------------------------

    /// Starts an optional field with a one-byte item id.
    pub fn write_item_id(&mut self, item_id: u8) -> Result<(), WriteError> {
        if item_id == ITEM_END {
            return Err(WriteError::ReservedItemId);
        }
        self.out.write_u8(item_id);
        Ok(())
    }

    /// Terminates a tagged-item list.
    pub fn write_items_end(&mut self) {
        self.out.write_u8(ITEM_END);
    }
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), WriteError> {
    if len > max {
        return Err(WriteError::LengthExceedsLimit { field, len, max });
    }
    Ok(())
}

// =============================================================================
// READING
// =============================================================================

/// Header of a chunk opened by [`ArchiveReader::begin_read_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub type_code: u32,
    /// Present for versioned chunks.
    pub version: Option<ChunkVersion>,
    /// Bytes after the length prefix, version pair included.
    pub declared_length: u64,
    /// Offset of the type code.
    pub start: usize,
    /// Offset one past the last body byte.
    pub end: usize,
}

impl ChunkHeader {
    /// Returns the version pair, failing for plain chunks.
    pub fn version(&self) -> Result<ChunkVersion, ReadError> {
        self.version.ok_or(ReadError::UnversionedChunk {
            type_code: self.type_code,
        })
    }

    /// Checks the major version and returns the minor version.
    pub fn check_major(&self, supported: i32) -> Result<i32, ReadError> {
        let version = self.version()?;
        if version.major != supported {
            return Err(ReadError::UnsupportedMajorVersion {
                type_code: self.type_code,
                major: version.major,
                supported,
            });
        }
        Ok(version.minor)
    }
}

#[derive(Debug, Clone)]
struct OpenReadChunk {
    end: usize,
    parent_limit: usize,
}

/// Reads an archive produced by [`ArchiveWriter`].
#[derive(Debug, Clone)]
pub struct ArchiveReader<'a> {
    reader: Reader<'a>,
    version: ArchiveVersion,
    stored_version: i32,
    stack: Vec<OpenReadChunk>,
    max_depth: usize,
}

impl<'a> ArchiveReader<'a> {
    /// Validates the archive header and positions at the first chunk.
    pub fn open(data: &'a [u8]) -> Result<Self, ReadError> {
        let mut reader = Reader::new(data);
        let magic = reader.read_bytes(MAGIC.len(), "magic")?;
        if magic != MAGIC {
            let mut found = [0u8; 8];
            found.copy_from_slice(magic);
            return Err(ReadError::InvalidMagic { found });
        }
        let stored_version = reader.read_i32("archive_version")?;
        let version = ArchiveVersion::from_i32(stored_version)?;
        Ok(Self {
            reader,
            version,
            stored_version,
            stack: Vec::new(),
            max_depth: MAX_CHUNK_DEPTH,
        })
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the generation used to interpret the archive layout.
    pub fn version(&self) -> ArchiveVersion {
        self.version
    }

    /// Returns the version number stored in the header.
    pub fn stored_version(&self) -> i32 {
        self.stored_version
    }

    /// Returns the number of open chunks.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the current byte offset.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Returns true when the innermost open chunk (or the stream) is exhausted.
    pub fn at_chunk_end(&self) -> bool {
        self.reader.is_empty()
    }

    /// Returns the bytes left in the innermost open chunk.
    pub fn remaining_in_chunk(&self) -> usize {
        self.reader.remaining_len()
    }

    /// Returns the type code of the next chunk without consuming it.
    pub fn peek_type_code(&self) -> Option<u32> {
        let mut ahead = self.reader.clone();
        ahead.read_u32("peek").ok()
    }

    /// Opens the next chunk.
    ///
    /// On a malformed or truncated header the position moves to the end
    /// of the enclosing chunk (or stream), so the caller's own
    /// `end_read_chunk` still lands on a valid boundary.
    pub fn begin_read_chunk(&mut self) -> Result<ChunkHeader, ReadError> {
        if self.stack.len() >= self.max_depth {
            return Err(ReadError::ChunkDepthExceeded { max: self.max_depth });
        }
        match self.read_header() {
            Ok(header) => {
                self.stack.push(OpenReadChunk {
                    end: header.end,
                    parent_limit: self.reader.limit(),
                });
                self.reader.set_limit(header.end);
                Ok(header)
            }
            Err(e) => {
                let boundary = self.reader.limit();
                self.reader.seek(boundary);
                Err(e)
            }
        }
    }

    fn read_header(&mut self) -> Result<ChunkHeader, ReadError> {
        let start = self.reader.position();
        let type_code = self.reader.read_u32("chunk type code")?;
        let declared_length = match self.version.length_width() {
            4 => self.reader.read_u32("chunk length")? as u64,
            _ => self.reader.read_u64("chunk length")?,
        };
        let available = self.reader.remaining_len() as u64;
        if declared_length > available {
            return Err(ReadError::ChunkOverrun {
                type_code,
                declared: declared_length,
                available,
            });
        }
        let end = self.reader.position() + declared_length as usize;

        let version = if is_versioned(type_code) {
            if declared_length < 8 {
                return Err(ReadError::UnversionedChunk { type_code });
            }
            let major = self.reader.read_i32("chunk major version")?;
            let minor = self.reader.read_i32("chunk minor version")?;
            Some(ChunkVersion::new(major, minor))
        } else {
            None
        };

        Ok(ChunkHeader {
            type_code,
            version,
            declared_length,
            start,
            end,
        })
    }

    /// Closes the innermost chunk, moving to its declared end.
    pub fn end_read_chunk(&mut self) -> Result<(), ReadError> {
        let chunk = self.stack.pop().ok_or(ReadError::ChunkNestingMismatch {
            context: "end_read_chunk without an open chunk",
        })?;
        self.reader.set_limit(chunk.parent_limit);
        self.reader.seek(chunk.end);
        Ok(())
    }

    /// Reads one chunk with `body`, always closing it afterwards.
    pub fn read_chunk<T, F>(&mut self, body: F) -> Result<T, ReadError>
    where
        F: FnOnce(&mut Self, &ChunkHeader) -> Result<T, ReadError>,
    {
        let header = self.begin_read_chunk()?;
        let result = body(self, &header);
        let end = self.end_read_chunk();
        match (result, end) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }

    /// Reads one chunk that must have type `expected`.
    pub fn read_expected_chunk<T, F>(&mut self, expected: u32, body: F) -> Result<T, ReadError>
    where
        F: FnOnce(&mut Self, &ChunkHeader) -> Result<T, ReadError>,
    {
        self.read_chunk(|r, header| {
            if header.type_code != expected {
                return Err(ReadError::UnexpectedChunk {
                    expected,
                    found: header.type_code,
                });
            }
            body(r, header)
        })
    }

    // --- primitives ---------------------------------------------------------

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, ReadError> {
        self.reader.read_u8(context)
    }

    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, ReadError> {
        self.reader.read_bool(context)
    }

    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, ReadError> {
        self.reader.read_i32(context)
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, ReadError> {
        self.reader.read_u32(context)
    }

    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, ReadError> {
        self.reader.read_i64(context)
    }

    pub fn read_u64(&mut self, context: &'static str) -> Result<u64, ReadError> {
        self.reader.read_u64(context)
    }

    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, ReadError> {
        self.reader.read_f64(context)
    }

    pub fn read_id(&mut self, context: &'static str) -> Result<Id, ReadError> {
        self.reader.read_id(context)
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String, ReadError> {
        self.reader.read_string(MAX_STRING_LEN, field)
    }

    pub fn read_bytes(&mut self, field: &'static str) -> Result<Vec<u8>, ReadError> {
        self.reader.read_bytes_prefixed(MAX_BLOB_LEN, field)
    }

    pub fn read_id_vec(&mut self, field: &'static str) -> Result<Vec<Id>, ReadError> {
        self.reader.read_id_vec(MAX_ARRAY_LEN, field)
    }

    pub fn read_f64_vec(&mut self, field: &'static str) -> Result<Vec<f64>, ReadError> {
        self.reader.read_f64_vec(MAX_ARRAY_LEN, field)
    }

    /// Reads the next tagged-item id.
    ///
    /// Returns `None` at the end marker or at the end of the chunk.
    pub fn read_item_id(&mut self) -> Result<Option<u8>, ReadError> {
        if self.reader.is_empty() {
            return Ok(None);
        }
        match self.reader.read_u8("item id")? {
            ITEM_END => Ok(None),
            id => Ok(Some(id)),
        }
    }
}
