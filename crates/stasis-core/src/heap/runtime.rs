//! Runtime adapter interface
//!
//! The snapshot engine never touches heap internals directly. It reads and
//! rebuilds objects through [`ScriptRuntime`], which a scripting runtime
//! implements over its own object model. [`Heap`](super::Heap) is the
//! in-tree implementation.

use super::object::{HostValue, NativeTypeId};
use crate::error::HeapError;
use crate::value::{ObjectId, Value};

/// Read/write adapter over a script heap
///
/// Readers return `None` when the handle does not refer to an object of the
/// expected kind.
pub trait ScriptRuntime {
    /// Root of the loaded program's namespace tree
    fn namespace(&self) -> ObjectId;

    /// Bytes of a string
    fn string_bytes(&self, id: ObjectId) -> Option<&[u8]>;

    /// Snapshot of a table's entries
    fn table_entries(&self, id: ObjectId) -> Option<Vec<(Value, Value)>>;

    /// Elements of an array
    fn array_elements(&self, id: ObjectId) -> Option<&[Value]>;

    /// Class of an instance
    fn instance_class(&self, id: ObjectId) -> Option<ObjectId>;

    /// Member slot values of an instance
    fn instance_members(&self, id: ObjectId) -> Option<&[Value]>;

    /// Host payload embedded in an instance, if any
    fn instance_native(&self, id: ObjectId) -> Option<&HostValue>;

    /// Payload of a standalone host value
    fn userdata(&self, id: ObjectId) -> Option<&HostValue>;

    /// Member slot names declared by a class, in slot order
    fn class_members(&self, class: ObjectId) -> Option<&[String]>;

    /// Methods declared by a class
    fn class_methods(&self, class: ObjectId) -> Option<Vec<(String, ObjectId)>>;

    /// Host binding of a class
    fn class_host_type(&self, class: ObjectId) -> Option<NativeTypeId>;

    /// Intern a string
    fn alloc_string(&mut self, bytes: &[u8]) -> Result<ObjectId, HeapError>;

    /// Allocate an empty table
    fn alloc_table(&mut self) -> Result<ObjectId, HeapError>;

    /// Allocate an array of `len` nulls
    fn alloc_array(&mut self, len: usize) -> Result<ObjectId, HeapError>;

    /// Allocate an instance of `class` with every member null
    fn alloc_instance(&mut self, class: ObjectId) -> Result<ObjectId, HeapError>;

    /// Allocate a standalone host value
    fn alloc_userdata(&mut self, value: HostValue) -> Result<ObjectId, HeapError>;

    /// Insert or overwrite a table entry
    fn table_set(&mut self, table: ObjectId, key: Value, value: Value) -> Result<(), HeapError>;

    /// Write an array element
    fn array_set(&mut self, array: ObjectId, index: usize, value: Value)
        -> Result<(), HeapError>;

    /// Write an instance member slot
    fn instance_set_member(
        &mut self,
        instance: ObjectId,
        slot: usize,
        value: Value,
    ) -> Result<(), HeapError>;

    /// Attach a host payload to an instance
    fn instance_set_native(&mut self, instance: ObjectId, value: HostValue)
        -> Result<(), HeapError>;
}
