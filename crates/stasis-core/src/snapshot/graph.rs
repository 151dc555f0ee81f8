//! Flat graph buffer layout
//!
//! ```text
//! for kind in [Class, Closure, String, Array, Table, Instance]:
//!     count: u32
//!     count x record
//! root: ProcessedObject
//! ```
//!
//! Records:
//!
//! ```text
//! Class            nameLength: u32, name: [u8],
//!                  memberCount: u32, memberCount x (nameLength: u32, name: [u8])
//! Closure          nameLength: u32, name: [u8]
//! String           byteLength: u32, bytes: [u8]
//! Array            elementCount: u32, elementCount x ProcessedObject
//! Table            pairCount: u32, pairCount x (key, value)
//! Instance         class: ProcessedObject, memberCount: u32,
//!                  memberCount x ProcessedObject,
//!                  hasUserData: bool, [userTypeTag: u8, bytes]
//! ```
//!
//! Records refer to each other only through [`ProcessedObject`] indices, so
//! a [`RawGraph`] can be parsed and validated without touching a runtime.

use super::io::{BufferReader, BufferWriter};
use super::processed::ProcessedObject;
use super::user_types;
use crate::error::DecodeError;
use crate::heap::HostData;
use crate::value::ValueKind;

/// Section order of the buffer
pub const SECTION_ORDER: [ValueKind; 6] = [
    ValueKind::Class,
    ValueKind::Closure,
    ValueKind::String,
    ValueKind::Array,
    ValueKind::Table,
    ValueKind::Instance,
];

/// Stable name of a class and the member slot names it had when saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    /// Dotted class path
    pub name: String,
    /// Member slot names in slot order
    pub members: Vec<String>,
}

impl ClassRecord {
    /// Create a class record
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

/// Content record of an instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    /// Reference into the class section
    pub class: ProcessedObject,
    /// Member slot values in slot order
    pub members: Vec<ProcessedObject>,
    /// Embedded host payload
    pub native: Option<HostData>,
}

/// Decoded but unresolved snapshot graph
#[derive(Debug, Clone, PartialEq)]
pub struct RawGraph {
    /// Class names and recorded member layouts
    pub classes: Vec<ClassRecord>,
    /// Stable function names
    pub closures: Vec<String>,
    /// String contents
    pub strings: Vec<Vec<u8>>,
    /// Array elements
    pub arrays: Vec<Vec<ProcessedObject>>,
    /// Table entries
    pub tables: Vec<Vec<(ProcessedObject, ProcessedObject)>>,
    /// Instance records
    pub instances: Vec<InstanceRecord>,
    /// The snapshot root
    pub root: ProcessedObject,
}

impl Default for RawGraph {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            closures: Vec::new(),
            strings: Vec::new(),
            arrays: Vec::new(),
            tables: Vec::new(),
            instances: Vec::new(),
            root: ProcessedObject::Null,
        }
    }
}

impl RawGraph {
    /// Parse a graph buffer
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::parse_with_limit(bytes, None)
    }

    /// Parse a graph buffer, rejecting it if the sections declare more than
    /// `max_objects` objects in total
    pub fn parse_with_limit(bytes: &[u8], max_objects: Option<usize>) -> Result<Self, DecodeError> {
        let mut reader = BufferReader::new(bytes);
        let mut counter = ObjectCounter {
            total: 0,
            limit: max_objects,
        };
        let mut graph = RawGraph::default();

        let count = counter.read(&mut reader, 8)?;
        graph.classes = read_records(count, &mut reader, read_class)?;

        let count = counter.read(&mut reader, 4)?;
        graph.closures = read_records(count, &mut reader, read_name)?;

        let count = counter.read(&mut reader, 4)?;
        graph.strings = read_records(count, &mut reader, |r| Ok(r.read_bytes()?.to_vec()))?;

        let count = counter.read(&mut reader, 4)?;
        graph.arrays = read_records(count, &mut reader, |r| {
            let len = r.read_count(ProcessedObject::MIN_ENCODED_SIZE)?;
            read_records(len, r, ProcessedObject::decode)
        })?;

        let count = counter.read(&mut reader, 4)?;
        graph.tables = read_records(count, &mut reader, |r| {
            let len = r.read_count(2 * ProcessedObject::MIN_ENCODED_SIZE)?;
            read_records(len, r, |r| {
                Ok((ProcessedObject::decode(r)?, ProcessedObject::decode(r)?))
            })
        })?;

        let count = counter.read(&mut reader, 10)?;
        graph.instances = read_records(count, &mut reader, read_instance)?;

        graph.root = ProcessedObject::decode(&mut reader)?;

        if reader.has_more() {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Ok(graph)
    }

    /// Encode the graph
    pub fn write(&self, writer: &mut BufferWriter) {
        writer.write_u32(self.classes.len() as u32);
        for class in &self.classes {
            writer.write_bytes(class.name.as_bytes());
            writer.write_u32(class.members.len() as u32);
            for member in &class.members {
                writer.write_bytes(member.as_bytes());
            }
        }
        writer.write_u32(self.closures.len() as u32);
        for name in &self.closures {
            writer.write_bytes(name.as_bytes());
        }
        writer.write_u32(self.strings.len() as u32);
        for bytes in &self.strings {
            writer.write_bytes(bytes);
        }
        writer.write_u32(self.arrays.len() as u32);
        for elements in &self.arrays {
            writer.write_u32(elements.len() as u32);
            for element in elements {
                element.encode(writer);
            }
        }
        writer.write_u32(self.tables.len() as u32);
        for entries in &self.tables {
            writer.write_u32(entries.len() as u32);
            for (key, value) in entries {
                key.encode(writer);
                value.encode(writer);
            }
        }
        writer.write_u32(self.instances.len() as u32);
        for record in &self.instances {
            record.class.encode(writer);
            writer.write_u32(record.members.len() as u32);
            for member in &record.members {
                member.encode(writer);
            }
            writer.write_bool(record.native.is_some());
            if let Some(native) = &record.native {
                user_types::encode(native, writer);
            }
        }
        self.root.encode(writer);
    }

    /// Encode the graph into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        self.write(&mut writer);
        writer.into_bytes()
    }

    /// Number of records in a section
    pub fn section_len(&self, kind: ValueKind) -> Option<usize> {
        Some(match kind {
            ValueKind::Class => self.classes.len(),
            ValueKind::Closure => self.closures.len(),
            ValueKind::String => self.strings.len(),
            ValueKind::Array => self.arrays.len(),
            ValueKind::Table => self.tables.len(),
            ValueKind::Instance => self.instances.len(),
            _ => return None,
        })
    }

    /// Total number of section records
    pub fn object_count(&self) -> usize {
        SECTION_ORDER
            .iter()
            .filter_map(|kind| self.section_len(*kind))
            .sum()
    }

    /// Check that a reference points inside its section
    pub fn check(&self, object: &ProcessedObject) -> Result<(), DecodeError> {
        if let ProcessedObject::Ref { kind, index } = *object {
            let len = self.section_len(kind).unwrap_or(0);
            if index as usize >= len {
                return Err(DecodeError::IndexOutOfRange { kind, index, len });
            }
        }
        Ok(())
    }

    /// Check every reference in the graph against the section bounds
    pub fn validate(&self) -> Result<(), DecodeError> {
        for elements in &self.arrays {
            elements.iter().try_for_each(|e| self.check(e))?;
        }
        for entries in &self.tables {
            for (key, value) in entries {
                self.check(key)?;
                self.check(value)?;
            }
        }
        for record in &self.instances {
            self.check(&record.class)?;
            if let ProcessedObject::Ref {
                kind: ValueKind::Class,
                index,
            } = record.class
            {
                let expected = self.classes.get(index as usize).map_or(0, |c| c.members.len());
                if record.members.len() != expected {
                    return Err(DecodeError::MemberCountMismatch {
                        class: index,
                        expected,
                        found: record.members.len(),
                    });
                }
            }
            record.members.iter().try_for_each(|m| self.check(m))?;
        }
        self.check(&self.root)
    }
}

struct ObjectCounter {
    total: usize,
    limit: Option<usize>,
}

impl ObjectCounter {
    fn read(
        &mut self,
        reader: &mut BufferReader<'_>,
        min_record_size: usize,
    ) -> Result<usize, DecodeError> {
        let count = reader.read_count(min_record_size)?;
        self.total += count;
        if let Some(limit) = self.limit {
            if self.total > limit {
                return Err(DecodeError::TooManyObjects {
                    declared: self.total,
                    limit,
                });
            }
        }
        Ok(count)
    }
}

fn read_records<'a, T>(
    count: usize,
    reader: &mut BufferReader<'a>,
    mut read: impl FnMut(&mut BufferReader<'a>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(read(reader)?);
    }
    Ok(records)
}

fn read_name(reader: &mut BufferReader<'_>) -> Result<String, DecodeError> {
    let offset = reader.position();
    let bytes = reader.read_bytes()?;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| DecodeError::InvalidUtf8 { offset })
}

fn read_class(reader: &mut BufferReader<'_>) -> Result<ClassRecord, DecodeError> {
    let name = read_name(reader)?;
    let len = reader.read_count(4)?;
    let members = read_records(len, reader, read_name)?;
    Ok(ClassRecord { name, members })
}

fn read_instance(reader: &mut BufferReader<'_>) -> Result<InstanceRecord, DecodeError> {
    let class = ProcessedObject::decode(reader)?;
    if class.kind() != ValueKind::Class {
        return Err(DecodeError::UnexpectedKind {
            expected: ValueKind::Class,
            found: class.kind(),
        });
    }
    let len = reader.read_count(ProcessedObject::MIN_ENCODED_SIZE)?;
    let members = read_records(len, reader, ProcessedObject::decode)?;
    let native = if reader.read_bool()? {
        Some(user_types::decode(reader)?)
    } else {
        None
    };
    Ok(InstanceRecord {
        class,
        members,
        native,
    })
}
