//! Primitive encoding/decoding for the archive format.
//!
//! All integers and floats are fixed-width little-endian. Text and byte
//! runs carry a `u32` length prefix.

use crate::error::ReadError;
use crate::model::Id;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives with
/// bounds checking. Reads never cross the current limit, which the chunk
/// layer narrows to the end of the innermost open chunk.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len(),
        }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves to an absolute position, clamped to the data length.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// Returns the offset reads may not cross.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Sets the offset reads may not cross, clamped to the data length.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(self.data.len());
    }

    /// Returns the total length of the underlying data.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of bytes left before the limit.
    pub fn remaining_len(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    /// Returns true if the limit has been reached.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.limit
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, ReadError> {
        if self.pos >= self.limit {
            return Err(ReadError::TruncatedStream { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], ReadError> {
        if n > self.remaining_len() {
            return Err(ReadError::TruncatedStream { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], ReadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Reads a boolean stored as one byte (0 or 1).
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, ReadError> {
        match self.read_u8(context)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(ReadError::InvalidBool { value }),
        }
    }

    /// Reads a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, ReadError> {
        Ok(i32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, ReadError> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian i64.
    #[inline]
    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, ReadError> {
        Ok(i64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self, context: &'static str) -> Result<u64, ReadError> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian f64.
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, ReadError> {
        Ok(f64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a 16-byte identifier.
    #[inline]
    pub fn read_id(&mut self, context: &'static str) -> Result<Id, ReadError> {
        self.read_array(context)
    }

    /// Reads a `u32` element count and checks it against `max_len`.
    pub fn read_len(&mut self, max_len: usize, field: &'static str) -> Result<usize, ReadError> {
        let len = self.read_u32(field)? as usize;
        if len > max_len {
            return Err(ReadError::LengthExceedsLimit {
                field,
                len,
                max: max_len,
            });
        }
        Ok(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self, max_len: usize, field: &'static str) -> Result<String, ReadError> {
        let len = self.read_len(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| ReadError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed byte array.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<Vec<u8>, ReadError> {
        let len = self.read_len(max_len, field)?;
        Ok(self.read_bytes(len, field)?.to_vec())
    }

    /// Reads a vector of IDs with length prefix.
    pub fn read_id_vec(&mut self, max_len: usize, field: &'static str) -> Result<Vec<Id>, ReadError> {
        let count = self.read_len(max_len, field)?;
        if count.saturating_mul(16) > self.remaining_len() {
            return Err(ReadError::TruncatedStream { context: field });
        }
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.read_id(field)?);
        }
        Ok(ids)
    }

    /// Reads a vector of f64 with length prefix.
    pub fn read_f64_vec(&mut self, max_len: usize, field: &'static str) -> Result<Vec<f64>, ReadError> {
        let count = self.read_len(max_len, field)?;
        if count.saturating_mul(8) > self.remaining_len() {
            return Err(ReadError::TruncatedStream { context: field });
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_f64(field)?);
        }
        Ok(values)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
///
/// Backed by a growable buffer so that length prefixes can be patched
/// after the body has been written.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Writes a little-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian i64.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian u64.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 16-byte identifier.
    #[inline]
    pub fn write_id(&mut self, id: &Id) {
        self.buf.extend_from_slice(id);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a vector of IDs with length prefix.
    pub fn write_id_vec(&mut self, ids: &[Id]) {
        self.write_u32(ids.len() as u32);
        for id in ids {
            self.write_id(id);
        }
    }

    /// Writes a vector of f64 with length prefix.
    pub fn write_f64_vec(&mut self, values: &[f64]) {
        self.write_u32(values.len() as u32);
        for v in values {
            self.write_f64(*v);
        }
    }

    /// Overwrites four bytes at `pos` with a little-endian u32.
    pub fn patch_u32(&mut self, pos: usize, value: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Overwrites eight bytes at `pos` with a little-endian u64.
    pub fn patch_u64(&mut self, pos: usize, value: u64) {
        self.buf[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut writer = Writer::new();
        writer.write_i32(-7);
        writer.write_u32(u32::MAX);
        writer.write_i64(i64::MIN);
        writer.write_u64(42);
        writer.write_f64(-1.5);
        writer.write_bool(true);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_i32("a").unwrap(), -7);
        assert_eq!(reader.read_u32("b").unwrap(), u32::MAX);
        assert_eq!(reader.read_i64("c").unwrap(), i64::MIN);
        assert_eq!(reader.read_u64("d").unwrap(), 42);
        assert_eq!(reader.read_f64("e").unwrap(), -1.5);
        assert!(reader.read_bool("f").unwrap());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = Writer::new();
        writer.write_u32(0x0403_0201);
        assert_eq!(writer.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_string_roundtrip() {
        let test_strings = ["", "hello", "Base (1)", "unicode: \u{1F600}"];

        for s in test_strings {
            let mut writer = Writer::new();
            writer.write_string(s);

            let mut reader = Reader::new(writer.as_bytes());
            let decoded = reader.read_string(1000, "test").unwrap();
            assert_eq!(s, decoded);
        }
    }

    #[test]
    fn test_string_too_long() {
        let mut writer = Writer::new();
        writer.write_u32(1000);
        writer.write_bytes(&[b'a'; 1000]);

        let mut reader = Reader::new(writer.as_bytes());
        let result = reader.read_string(100, "test");
        assert!(matches!(
            result,
            Err(ReadError::LengthExceedsLimit { max: 100, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = Writer::new();
        writer.write_bytes_prefixed(&[0xFF, 0xFE]);

        let mut reader = Reader::new(writer.as_bytes());
        let result = reader.read_string(100, "name");
        assert!(matches!(result, Err(ReadError::InvalidUtf8 { field: "name" })));
    }

    #[test]
    fn test_invalid_bool() {
        let mut reader = Reader::new(&[2]);
        assert!(matches!(
            reader.read_bool("flag"),
            Err(ReadError::InvalidBool { value: 2 })
        ));
    }

    #[test]
    fn test_id_vec_roundtrip() {
        let ids = vec![[1u8; 16], [2u8; 16]];
        let mut writer = Writer::new();
        writer.write_id_vec(&ids);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_id_vec(10, "ids").unwrap(), ids);
    }

    #[test]
    fn test_id_vec_count_larger_than_data() {
        let mut writer = Writer::new();
        writer.write_u32(1000);
        writer.write_id(&[9u8; 16]);

        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_id_vec(10_000, "ids"),
            Err(ReadError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut reader = Reader::new(&data);
        let result = reader.read_bytes(10, "test");
        assert!(matches!(result, Err(ReadError::TruncatedStream { .. })));
    }

    #[test]
    fn test_limit_bounds_reads() {
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0];
        let mut reader = Reader::new(&data);
        reader.set_limit(4);
        assert_eq!(reader.read_u32("first").unwrap(), 1);
        assert!(reader.read_u32("second").is_err());

        reader.set_limit(8);
        assert_eq!(reader.read_u32("second").unwrap(), 2);
    }

    #[test]
    fn test_patch_length() {
        let mut writer = Writer::new();
        writer.write_u64(0);
        writer.write_u32(0);
        writer.patch_u64(0, 99);
        writer.patch_u32(8, 7);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_u64("a").unwrap(), 99);
        assert_eq!(reader.read_u32("b").unwrap(), 7);
    }
}
