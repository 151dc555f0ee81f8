//! Processed object references
//!
//! A [`ProcessedObject`] is how a snapshot refers to any script value: an
//! inline scalar, a host payload carried by value, or a `(kind, index)`
//! pair pointing into one of the per-kind sections. Wire shape:
//!
//! ```text
//! kindTag: u8
//! Null      -> (nothing)
//! Bool      -> u8 (0 or 1)
//! Integer   -> i64
//! Float     -> f64
//! UserData  -> userTypeTag: u8, type-specific bytes
//! otherwise -> index: u32
//! ```

use super::io::{BufferReader, BufferWriter};
use super::user_types;
use crate::error::DecodeError;
use crate::heap::HostData;
use crate::value::ValueKind;

/// Reference to a script value inside a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedObject {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// Index into the section of a reference kind
    Ref {
        /// Section kind (String, Table, Array, Instance, Class or Closure)
        kind: ValueKind,
        /// Position within the section
        index: u32,
    },
    /// Standalone host value, stored inline
    UserData(HostData),
}

impl ProcessedObject {
    /// Smallest encoded size, used to bound declared element counts
    pub const MIN_ENCODED_SIZE: usize = 1;

    /// Section reference
    pub const fn reference(kind: ValueKind, index: u32) -> Self {
        ProcessedObject::Ref { kind, index }
    }

    /// Kind of the value this refers to
    pub fn kind(&self) -> ValueKind {
        match self {
            ProcessedObject::Null => ValueKind::Null,
            ProcessedObject::Bool(_) => ValueKind::Bool,
            ProcessedObject::Integer(_) => ValueKind::Integer,
            ProcessedObject::Float(_) => ValueKind::Float,
            ProcessedObject::Ref { kind, .. } => *kind,
            ProcessedObject::UserData(_) => ValueKind::UserData,
        }
    }

    /// Encode to the wire shape
    pub fn encode(&self, writer: &mut BufferWriter) {
        writer.write_u8(self.kind().to_u8());
        match self {
            ProcessedObject::Null => {}
            ProcessedObject::Bool(b) => writer.write_bool(*b),
            ProcessedObject::Integer(i) => writer.write_i64(*i),
            ProcessedObject::Float(f) => writer.write_f64(*f),
            ProcessedObject::Ref { index, .. } => writer.write_u32(*index),
            ProcessedObject::UserData(data) => user_types::encode(data, writer),
        }
    }

    /// Decode from the wire shape
    pub fn decode(reader: &mut BufferReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let tag = reader.read_u8()?;
        let kind = ValueKind::from_u8(tag).ok_or(DecodeError::InvalidKindTag { tag, offset })?;
        Ok(match kind {
            ValueKind::Null => ProcessedObject::Null,
            ValueKind::Bool => ProcessedObject::Bool(reader.read_bool()?),
            ValueKind::Integer => ProcessedObject::Integer(reader.read_i64()?),
            ValueKind::Float => ProcessedObject::Float(reader.read_f64()?),
            ValueKind::UserData => ProcessedObject::UserData(user_types::decode(reader)?),
            ValueKind::String
            | ValueKind::Table
            | ValueKind::Array
            | ValueKind::Instance
            | ValueKind::Class
            | ValueKind::Closure => ProcessedObject::Ref {
                kind,
                index: reader.read_u32()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(bytes: &[u8]) -> Result<ProcessedObject, DecodeError> {
        ProcessedObject::decode(&mut BufferReader::new(bytes))
    }

    #[test]
    fn test_reference_layout() {
        let mut writer = BufferWriter::new();
        ProcessedObject::reference(ValueKind::Array, 2).encode(&mut writer);
        assert_eq!(writer.buffer(), &[6, 2, 0, 0, 0]);
    }

    #[test]
    fn test_null_is_one_byte() {
        let mut writer = BufferWriter::new();
        ProcessedObject::Null.encode(&mut writer);
        assert_eq!(writer.offset(), ProcessedObject::MIN_ENCODED_SIZE);
    }

    #[test]
    fn test_decode_reference() {
        assert_eq!(
            decode_bytes(&[5, 7, 0, 0, 0]).unwrap(),
            ProcessedObject::reference(ValueKind::Table, 7)
        );
    }

    #[test]
    fn test_decode_invalid_kind_tag() {
        assert_eq!(
            decode_bytes(&[200]),
            Err(DecodeError::InvalidKindTag {
                tag: 200,
                offset: 0
            })
        );
    }

    #[test]
    fn test_decode_truncated_index() {
        assert_eq!(
            decode_bytes(&[4, 1, 0]),
            Err(DecodeError::UnexpectedEnd { offset: 1 })
        );
    }

    #[test]
    fn test_float_bits_preserved() {
        let mut writer = BufferWriter::new();
        ProcessedObject::Float(f64::NAN).encode(&mut writer);
        let bytes = writer.into_bytes();
        match decode_bytes(&bytes).unwrap() {
            ProcessedObject::Float(f) => assert!(f.is_nan()),
            other => panic!("expected float, got {:?}", other),
        }
    }
}
