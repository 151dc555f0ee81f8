//! Heap object layouts

use crate::value::{ObjectId, Value};
use rustc_hash::FxHashMap;

/// Identity of a host-native type binding
///
/// Stands in for the type tag pointer a host attaches to its bound classes.
/// IDs are assigned per heap, so the same host type usually gets a different
/// ID after a program reload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeTypeId(u32);

impl NativeTypeId {
    /// Create a native type ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Payload of a host-native value
///
/// Closed set: only these host types may cross into the script heap.
#[derive(Debug, Clone, PartialEq)]
pub enum HostData {
    /// 2D vector
    Vector2 {
        /// X component
        x: f64,
        /// Y component
        y: f64,
    },
    /// RGBA color
    Color([u8; 4]),
    /// Handle to an engine entity
    Entity(u64),
    /// Opaque byte buffer
    Blob(Vec<u8>),
}

/// A host-native value together with the binding it was created through
#[derive(Debug, Clone, PartialEq)]
pub struct HostValue {
    /// Binding identity
    pub type_id: NativeTypeId,
    /// Native payload
    pub data: HostData,
}

impl HostValue {
    /// Create a new host value
    pub fn new(type_id: NativeTypeId, data: HostData) -> Self {
        Self { type_id, data }
    }
}

/// Table object (heap-allocated)
///
/// Keys are compared by identity. Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<Value, usize>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.index.get(key).map(|&slot| self.entries[slot].1)
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or overwrite an entry
    pub fn set(&mut self, key: Value, value: Value) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Remove an entry, returning its value
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let slot = self.index.remove(key)?;
        let (_, value) = self.entries.remove(slot);
        for pos in self.index.values_mut() {
            if *pos > slot {
                *pos -= 1;
            }
        }
        Some(value)
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

/// Object instance (heap-allocated)
#[derive(Debug, Clone)]
pub struct Instance {
    /// Class of this instance
    pub class: ObjectId,
    /// Member slot values
    pub members: Vec<Value>,
    /// Embedded host payload, for instances of bound host classes
    pub native: Option<HostValue>,
}

impl Instance {
    /// Create an instance with all members null
    pub fn new(class: ObjectId, member_count: usize) -> Self {
        Self {
            class,
            members: vec![Value::Null; member_count],
            native: None,
        }
    }
}

/// Class definition
#[derive(Debug, Clone)]
pub struct Class {
    /// Declared name (last path segment)
    pub name: String,
    /// Member slot names, in slot order
    pub members: Vec<String>,
    /// Methods defined on the class
    pub methods: Vec<(String, ObjectId)>,
    /// Host binding, for classes that wrap a host-native type
    pub host_type: Option<NativeTypeId>,
}

impl Class {
    /// Create a class with the given member slots
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
            methods: Vec::new(),
            host_type: None,
        }
    }

    /// Number of member slots
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Slot index of a member
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m == name)
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<ObjectId> {
        self.methods
            .iter()
            .find(|(method, _)| method == name)
            .map(|(_, id)| *id)
    }
}

/// Function value
///
/// Only the declaration is kept; code lives with the loaded program.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Declared name
    pub name: String,
    /// Parameter count
    pub arity: u8,
}

/// A heap-allocated object
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// Interned byte string
    String(Box<[u8]>),
    /// Table
    Table(Table),
    /// Array
    Array(Vec<Value>),
    /// Class instance
    Instance(Instance),
    /// Class definition
    Class(Class),
    /// Function value
    Closure(Closure),
    /// Standalone host value
    UserData(HostValue),
}
