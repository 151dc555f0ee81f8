//! Script value representation
//!
//! Values are a closed sum type over the kinds a script heap can hold.
//! Scalars are stored inline; every other kind carries an [`ObjectId`]
//! handed out by the runtime adapter.
//!
//! # Identity
//!
//! Equality and hashing follow *identity* semantics so that a `Value`
//! can serve both as a table key and as a registry key:
//!
//! ```text
//! Null / Bool / Integer   by value
//! Float                   by bit pattern (NaN == NaN, 0.0 != -0.0)
//! reference kinds         by (kind, ObjectId)
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

/// Arena handle for a heap-allocated script object
///
/// Handles are only meaningful for the heap that issued them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Create an object ID from a raw arena index
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw arena index
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Get the raw value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a script value
///
/// The discriminants double as the `kindTag` byte of the wire format.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The null value
    Null = 0,
    /// Boolean
    Bool = 1,
    /// 64-bit signed integer
    Integer = 2,
    /// 64-bit float
    Float = 3,
    /// Interned byte string
    String = 4,
    /// Value-to-value mapping
    Table = 5,
    /// Ordered sequence
    Array = 6,
    /// Class-typed object with member slots
    Instance = 7,
    /// Type definition (static code)
    Class = 8,
    /// Function value (static code)
    Closure = 9,
    /// Opaque host-native value
    UserData = 10,
}

impl ValueKind {
    /// Every kind, in tag order
    pub const ALL: [ValueKind; 11] = [
        ValueKind::Null,
        ValueKind::Bool,
        ValueKind::Integer,
        ValueKind::Float,
        ValueKind::String,
        ValueKind::Table,
        ValueKind::Array,
        ValueKind::Instance,
        ValueKind::Class,
        ValueKind::Closure,
        ValueKind::UserData,
    ];

    /// Decode a wire tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Wire tag of this kind
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether values of this kind are stored inline
    pub const fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueKind::Null | ValueKind::Bool | ValueKind::Integer | ValueKind::Float
        )
    }

    /// Whether values of this kind are static code, matched by name
    pub const fn is_static(self) -> bool {
        matches!(self, ValueKind::Class | ValueKind::Closure)
    }

    /// Lowercase name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::Array => "array",
            ValueKind::Instance => "instance",
            ValueKind::Class => "class",
            ValueKind::Closure => "closure",
            ValueKind::UserData => "userdata",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A script value
#[derive(Clone, Copy, Default)]
pub enum Value {
    /// Null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// Interned string
    String(ObjectId),
    /// Table
    Table(ObjectId),
    /// Array
    Array(ObjectId),
    /// Class instance
    Instance(ObjectId),
    /// Class definition
    Class(ObjectId),
    /// Function value
    Closure(ObjectId),
    /// Host-native value
    UserData(ObjectId),
}

impl Value {
    /// Kind of this value
    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Array(_) => ValueKind::Array,
            Value::Instance(_) => ValueKind::Instance,
            Value::Class(_) => ValueKind::Class,
            Value::Closure(_) => ValueKind::Closure,
            Value::UserData(_) => ValueKind::UserData,
        }
    }

    /// Build a reference value of the given kind
    ///
    /// Returns `None` for scalar kinds.
    pub const fn from_object(kind: ValueKind, id: ObjectId) -> Option<Self> {
        Some(match kind {
            ValueKind::String => Value::String(id),
            ValueKind::Table => Value::Table(id),
            ValueKind::Array => Value::Array(id),
            ValueKind::Instance => Value::Instance(id),
            ValueKind::Class => Value::Class(id),
            ValueKind::Closure => Value::Closure(id),
            ValueKind::UserData => Value::UserData(id),
            ValueKind::Null | ValueKind::Bool | ValueKind::Integer | ValueKind::Float => {
                return None
            }
        })
    }

    /// Heap handle of a reference value
    pub const fn object_id(&self) -> Option<ObjectId> {
        match *self {
            Value::String(id)
            | Value::Table(id)
            | Value::Array(id)
            | Value::Instance(id)
            | Value::Class(id)
            | Value::Closure(id)
            | Value::UserData(id) => Some(id),
            Value::Null | Value::Bool(_) | Value::Integer(_) | Value::Float(_) => None,
        }
    }

    /// Check if this value is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract boolean value
    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Extract integer value
    pub const fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Extract float value
    pub const fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => match (self.object_id(), other.object_id()) {
                (Some(a), Some(b)) => self.kind() == other.kind() && a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match *self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(id)
            | Value::Table(id)
            | Value::Array(id)
            | Value::Instance(id)
            | Value::Class(id)
            | Value::Closure(id)
            | Value::UserData(id) => id.hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "bool({})", b),
            Value::Integer(i) => write!(f, "int({})", i),
            Value::Float(x) => write!(f, "float({})", x),
            other => match other.object_id() {
                Some(id) => write!(f, "{}({})", other.kind(), id),
                None => write!(f, "<??>"),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
