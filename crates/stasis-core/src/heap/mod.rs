//! Arena-backed script heap
//!
//! `Heap` is the in-tree implementation of [`ScriptRuntime`]. It stores
//! every object in a single arena indexed by [`ObjectId`], interns strings,
//! and keeps the program's namespace tree under a root table.

mod object;
mod program;
mod runtime;

pub use object::{Class, Closure, HeapObject, HostData, HostValue, Instance, NativeTypeId, Table};
pub use runtime::ScriptRuntime;

use crate::error::HeapError;
use crate::value::{ObjectId, Value, ValueKind};
use rustc_hash::FxHashMap;

/// Resource limits for a heap
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    /// Maximum number of live objects (None = unlimited)
    pub max_objects: Option<usize>,
}

impl ResourceLimits {
    /// Create unlimited resource limits
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Create resource limits with an object cap
    pub fn with_object_limit(max_objects: usize) -> Self {
        Self {
            max_objects: Some(max_objects),
        }
    }
}

/// Script heap
#[derive(Debug)]
pub struct Heap {
    objects: Vec<HeapObject>,
    interned: FxHashMap<Box<[u8]>, ObjectId>,
    namespace: ObjectId,
    limits: ResourceLimits,
    next_native_type: u32,
}

impl Heap {
    /// Create a heap holding only an empty namespace table
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::unlimited())
    }

    /// Create a heap with resource limits
    ///
    /// The namespace table is always allocated, even if the limit is zero.
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self {
            objects: vec![HeapObject::Table(Table::new())],
            interned: FxHashMap::default(),
            namespace: ObjectId::new(0),
            limits,
            next_native_type: 1,
        }
    }

    /// Number of allocated objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Get an object by handle
    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        self.objects.get(id.index())
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        self.objects.get_mut(id.index())
    }

    fn alloc(&mut self, object: HeapObject) -> Result<ObjectId, HeapError> {
        if let Some(limit) = self.limits.max_objects {
            if self.objects.len() >= limit {
                return Err(HeapError::LimitExceeded { limit });
            }
        }
        let id = ObjectId::new(self.objects.len() as u32);
        self.objects.push(object);
        Ok(id)
    }

    // ===== Convenience constructors =====

    /// Intern a UTF-8 string
    pub fn str(&mut self, s: &str) -> Result<Value, HeapError> {
        self.alloc_string(s.as_bytes()).map(Value::String)
    }

    /// Allocate an empty table
    pub fn new_table(&mut self) -> Result<Value, HeapError> {
        self.alloc_table().map(Value::Table)
    }

    /// Allocate an array holding `elements`
    pub fn new_array(&mut self, elements: Vec<Value>) -> Result<Value, HeapError> {
        self.alloc(HeapObject::Array(elements)).map(Value::Array)
    }

    /// Allocate an instance of `class` with the given member values
    pub fn new_instance(&mut self, class: ObjectId, members: &[Value]) -> Result<Value, HeapError> {
        let id = self.alloc_instance(class)?;
        for (slot, value) in members.iter().enumerate() {
            self.instance_set_member(id, slot, *value)?;
        }
        Ok(Value::Instance(id))
    }

    /// Allocate a standalone host value
    pub fn new_userdata(&mut self, value: HostValue) -> Result<Value, HeapError> {
        self.alloc_userdata(value).map(Value::UserData)
    }

    /// Allocate a function value that is not part of the namespace tree
    pub fn new_closure(&mut self, name: &str, arity: u8) -> Result<Value, HeapError> {
        self.alloc(HeapObject::Closure(Closure {
            name: name.to_string(),
            arity,
        }))
        .map(Value::Closure)
    }

    /// Set `table[key] = value` with a string key
    pub fn set_field(&mut self, table: Value, key: &str, value: Value) -> Result<(), HeapError> {
        let table = expect_kind(table, ValueKind::Table)?;
        let key = self.str(key)?;
        self.table_set(table, key, value)
    }

    // ===== Typed accessors =====

    /// Look up an already interned string without allocating
    pub fn interned(&self, s: &str) -> Option<Value> {
        self.interned.get(s.as_bytes()).copied().map(Value::String)
    }

    /// Get a string as UTF-8
    pub fn string(&self, value: Value) -> Option<&str> {
        match value {
            Value::String(id) => std::str::from_utf8(self.string_bytes(id)?).ok(),
            _ => None,
        }
    }

    /// Get a table
    pub fn table(&self, value: Value) -> Option<&Table> {
        match (value, value.object_id().and_then(|id| self.get(id))) {
            (Value::Table(_), Some(HeapObject::Table(table))) => Some(table),
            _ => None,
        }
    }

    /// Look up `table[key]` with a string key
    pub fn field(&self, table: Value, key: &str) -> Option<Value> {
        let key = self.interned(key)?;
        self.table(table)?.get(&key)
    }

    /// Get an array's elements
    pub fn array(&self, value: Value) -> Option<&[Value]> {
        match value {
            Value::Array(id) => self.array_elements(id),
            _ => None,
        }
    }

    /// Get an instance
    pub fn instance(&self, value: Value) -> Option<&Instance> {
        match (value, value.object_id().and_then(|id| self.get(id))) {
            (Value::Instance(_), Some(HeapObject::Instance(inst))) => Some(inst),
            _ => None,
        }
    }

    /// Get a class definition
    pub fn class(&self, id: ObjectId) -> Option<&Class> {
        match self.get(id)? {
            HeapObject::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Get a function value
    pub fn closure(&self, id: ObjectId) -> Option<&Closure> {
        match self.get(id)? {
            HeapObject::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    fn table_mut(&mut self, id: ObjectId) -> Result<&mut Table, HeapError> {
        match self.get_mut(id) {
            Some(HeapObject::Table(table)) => Ok(table),
            _ => Err(HeapError::WrongKind {
                object: id,
                expected: ValueKind::Table,
            }),
        }
    }

    fn instance_mut(&mut self, id: ObjectId) -> Result<&mut Instance, HeapError> {
        match self.get_mut(id) {
            Some(HeapObject::Instance(inst)) => Ok(inst),
            _ => Err(HeapError::WrongKind {
                object: id,
                expected: ValueKind::Instance,
            }),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_kind(value: Value, kind: ValueKind) -> Result<ObjectId, HeapError> {
    match value.object_id() {
        Some(id) if value.kind() == kind => Ok(id),
        Some(id) => Err(HeapError::WrongKind {
            object: id,
            expected: kind,
        }),
        None => Err(HeapError::NotAnObject(value.kind())),
    }
}

impl ScriptRuntime for Heap {
    fn namespace(&self) -> ObjectId {
        self.namespace
    }

    fn string_bytes(&self, id: ObjectId) -> Option<&[u8]> {
        match self.get(id)? {
            HeapObject::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn table_entries(&self, id: ObjectId) -> Option<Vec<(Value, Value)>> {
        match self.get(id)? {
            HeapObject::Table(table) => Some(table.iter().copied().collect()),
            _ => None,
        }
    }

    fn array_elements(&self, id: ObjectId) -> Option<&[Value]> {
        match self.get(id)? {
            HeapObject::Array(elements) => Some(elements),
            _ => None,
        }
    }

    fn instance_class(&self, id: ObjectId) -> Option<ObjectId> {
        match self.get(id)? {
            HeapObject::Instance(inst) => Some(inst.class),
            _ => None,
        }
    }

    fn instance_members(&self, id: ObjectId) -> Option<&[Value]> {
        match self.get(id)? {
            HeapObject::Instance(inst) => Some(&inst.members),
            _ => None,
        }
    }

    fn instance_native(&self, id: ObjectId) -> Option<&HostValue> {
        match self.get(id)? {
            HeapObject::Instance(inst) => inst.native.as_ref(),
            _ => None,
        }
    }

    fn userdata(&self, id: ObjectId) -> Option<&HostValue> {
        match self.get(id)? {
            HeapObject::UserData(value) => Some(value),
            _ => None,
        }
    }

    fn class_members(&self, class: ObjectId) -> Option<&[String]> {
        self.class(class).map(|c| c.members.as_slice())
    }

    fn class_methods(&self, class: ObjectId) -> Option<Vec<(String, ObjectId)>> {
        self.class(class).map(|c| c.methods.clone())
    }

    fn class_host_type(&self, class: ObjectId) -> Option<NativeTypeId> {
        self.class(class)?.host_type
    }

    fn alloc_string(&mut self, bytes: &[u8]) -> Result<ObjectId, HeapError> {
        if let Some(&id) = self.interned.get(bytes) {
            return Ok(id);
        }
        let id = self.alloc(HeapObject::String(bytes.into()))?;
        self.interned.insert(bytes.into(), id);
        Ok(id)
    }

    fn alloc_table(&mut self) -> Result<ObjectId, HeapError> {
        self.alloc(HeapObject::Table(Table::new()))
    }

    fn alloc_array(&mut self, len: usize) -> Result<ObjectId, HeapError> {
        self.alloc(HeapObject::Array(vec![Value::Null; len]))
    }

    fn alloc_instance(&mut self, class: ObjectId) -> Result<ObjectId, HeapError> {
        let member_count = self
            .class(class)
            .map(Class::member_count)
            .ok_or(HeapError::NotAClass(class))?;
        self.alloc(HeapObject::Instance(Instance::new(class, member_count)))
    }

    fn alloc_userdata(&mut self, value: HostValue) -> Result<ObjectId, HeapError> {
        self.alloc(HeapObject::UserData(value))
    }

    fn table_set(&mut self, table: ObjectId, key: Value, value: Value) -> Result<(), HeapError> {
        self.table_mut(table)?.set(key, value);
        Ok(())
    }

    fn array_set(&mut self, array: ObjectId, index: usize, value: Value) -> Result<(), HeapError> {
        match self.get_mut(array) {
            Some(HeapObject::Array(elements)) => {
                let len = elements.len();
                let slot = elements.get_mut(index).ok_or(HeapError::SlotOutOfRange {
                    object: array,
                    slot: index,
                    len,
                })?;
                *slot = value;
                Ok(())
            }
            _ => Err(HeapError::WrongKind {
                object: array,
                expected: ValueKind::Array,
            }),
        }
    }

    fn instance_set_member(
        &mut self,
        instance: ObjectId,
        slot: usize,
        value: Value,
    ) -> Result<(), HeapError> {
        let inst = self.instance_mut(instance)?;
        let len = inst.members.len();
        let member = inst.members.get_mut(slot).ok_or(HeapError::SlotOutOfRange {
            object: instance,
            slot,
            len,
        })?;
        *member = value;
        Ok(())
    }

    fn instance_set_native(
        &mut self,
        instance: ObjectId,
        value: HostValue,
    ) -> Result<(), HeapError> {
        self.instance_mut(instance)?.native = Some(value);
        Ok(())
    }
}
