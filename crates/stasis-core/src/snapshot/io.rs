//! Buffer encoding and decoding primitives
//!
//! All multi-byte values are little-endian.

use crate::error::DecodeError;

/// Growable snapshot buffer writer
#[derive(Debug, Default)]
pub struct BufferWriter {
    buffer: Vec<u8>,
}

impl BufferWriter {
    /// Create a new buffer writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new buffer writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the bytes written so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Write a raw byte
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write a boolean as a single byte
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    /// Write a u32
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a u64
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write an i64
    pub fn write_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write an f64
    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    /// Write raw bytes without a length prefix
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a u32 length prefix followed by the bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.buffer.extend_from_slice(bytes);
    }
}

/// Bounds-checked snapshot buffer reader
///
/// Every read fails with [`DecodeError::UnexpectedEnd`] instead of panicking
/// when the buffer is too short.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BufferReader<'a> {
    /// Create a new buffer reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the remaining bytes in the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.position,
            });
        }
        let buffer = self.buffer;
        let bytes = &buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean byte, rejecting anything other than 0 or 1
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        let offset = self.position;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { value, offset }),
        }
    }

    /// Read a u32
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.take_array().map(u32::from_le_bytes)
    }

    /// Read a u64
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.take_array().map(u64::from_le_bytes)
    }

    /// Read an i64
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.take_array().map(i64::from_le_bytes)
    }

    /// Read an f64
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.take_array().map(|b| f64::from_bits(u64::from_le_bytes(b)))
    }

    /// Read exactly `len` raw bytes
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.take(len)
    }

    /// Read a u32 length prefix followed by that many bytes
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_count(1)?;
        self.take(len)
    }

    /// Read a u32 element count
    ///
    /// `min_element_size` is the smallest encoding of one element. A count
    /// that could not possibly fit in the remaining bytes is rejected here,
    /// before the caller allocates anything for it.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, DecodeError> {
        let offset = self.position;
        let declared = self.read_u32()? as usize;
        let remaining = self.remaining();
        if declared.saturating_mul(min_element_size) > remaining {
            return Err(DecodeError::LengthOverflow {
                declared,
                remaining,
                offset,
            });
        }
        Ok(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_primitives() {
        let mut writer = BufferWriter::new();
        writer.write_u8(0x42);
        writer.write_bool(true);
        writer.write_u32(0xABCD_EF01);
        writer.write_i64(-42);
        writer.write_f64(3.5);
        writer.write_bytes(b"hello");

        let bytes = writer.into_bytes();
        let mut reader = BufferReader::new(&bytes);

        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_u32().unwrap(), 0xABCD_EF01);
        assert_eq!(reader.read_i64().unwrap(), -42);
        assert_eq!(reader.read_f64().unwrap(), 3.5);
        assert_eq!(reader.read_bytes().unwrap(), b"hello");
        assert!(!reader.has_more());
    }

    #[test]
    fn test_reader_bounds_checking() {
        let bytes = vec![0x01, 0x02, 0x03];
        let mut reader = BufferReader::new(&bytes);

        assert_eq!(
            reader.read_u32(),
            Err(DecodeError::UnexpectedEnd { offset: 0 })
        );
        // A failed read does not advance
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn test_reader_invalid_bool() {
        let bytes = vec![2];
        let mut reader = BufferReader::new(&bytes);
        assert_eq!(
            reader.read_bool(),
            Err(DecodeError::InvalidBool {
                value: 2,
                offset: 0
            })
        );
    }

    #[test]
    fn test_count_larger_than_buffer() {
        let mut writer = BufferWriter::new();
        writer.write_u32(u32::MAX);
        writer.write_u8(0);

        let bytes = writer.into_bytes();
        let mut reader = BufferReader::new(&bytes);
        assert!(matches!(
            reader.read_count(1),
            Err(DecodeError::LengthOverflow {
                declared,
                remaining: 1,
                offset: 0,
            }) if declared == u32::MAX as usize
        ));
    }
}
