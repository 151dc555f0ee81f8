//! Program loading helpers
//!
//! A script loader uses these to lay out the namespace tree before any
//! runtime state exists: nested namespace tables, classes with their
//! methods, free functions, and host type bindings.

use super::object::{Class, Closure, HeapObject, NativeTypeId};
use super::{Heap, ScriptRuntime};
use crate::error::HeapError;
use crate::value::{ObjectId, Value};

impl Heap {
    fn check_undefined(&self, parent: ObjectId, name: &str) -> Result<(), HeapError> {
        let taken = self.interned(name).is_some_and(|key| {
            self.table(Value::Table(parent))
                .is_some_and(|t| t.contains_key(&key))
        });
        if taken {
            return Err(HeapError::AlreadyDefined(name.to_string()));
        }
        Ok(())
    }

    fn define(&mut self, parent: ObjectId, name: &str, value: Value) -> Result<(), HeapError> {
        self.check_undefined(parent, name)?;
        let key = self.str(name)?;
        self.table_set(parent, key, value)
    }

    /// Create a nested namespace table `parent.name`
    pub fn define_namespace(&mut self, parent: ObjectId, name: &str) -> Result<ObjectId, HeapError> {
        self.check_undefined(parent, name)?;
        let table = self.alloc_table()?;
        self.define(parent, name, Value::Table(table))?;
        Ok(table)
    }

    /// Declare a class `parent.name` with the given member slots
    pub fn define_class(
        &mut self,
        parent: ObjectId,
        name: &str,
        members: &[&str],
    ) -> Result<ObjectId, HeapError> {
        self.check_undefined(parent, name)?;
        let members = members.iter().map(|m| m.to_string()).collect();
        let class = self.alloc(HeapObject::Class(Class::new(name, members)))?;
        self.define(parent, name, Value::Class(class))?;
        Ok(class)
    }

    /// Declare a method on a class
    pub fn define_method(
        &mut self,
        class: ObjectId,
        name: &str,
        arity: u8,
    ) -> Result<ObjectId, HeapError> {
        let owner = self.class(class).ok_or(HeapError::NotAClass(class))?;
        if owner.method(name).is_some() {
            return Err(HeapError::AlreadyDefined(format!("{}.{}", owner.name, name)));
        }
        let closure = self.alloc(HeapObject::Closure(Closure {
            name: name.to_string(),
            arity,
        }))?;
        if let Some(HeapObject::Class(c)) = self.get_mut(class) {
            c.methods.push((name.to_string(), closure));
        }
        Ok(closure)
    }

    /// Declare a free function `parent.name`
    pub fn define_function(
        &mut self,
        parent: ObjectId,
        name: &str,
        arity: u8,
    ) -> Result<ObjectId, HeapError> {
        self.check_undefined(parent, name)?;
        let closure = self.alloc(HeapObject::Closure(Closure {
            name: name.to_string(),
            arity,
        }))?;
        self.define(parent, name, Value::Closure(closure))?;
        Ok(closure)
    }

    /// Bind a host-native type as class `parent.name`
    ///
    /// Instances of the returned class carry a host payload tagged with the
    /// returned [`NativeTypeId`].
    pub fn bind_host_type(
        &mut self,
        parent: ObjectId,
        name: &str,
        members: &[&str],
    ) -> Result<(ObjectId, NativeTypeId), HeapError> {
        let class = self.define_class(parent, name, members)?;
        let type_id = NativeTypeId::new(self.next_native_type);
        self.next_native_type += 1;
        if let Some(HeapObject::Class(c)) = self.get_mut(class) {
            c.host_type = Some(type_id);
        }
        Ok((class, type_id))
    }

    /// Remove `parent.name` from the namespace
    pub fn undefine(&mut self, parent: ObjectId, name: &str) -> Option<Value> {
        let key = self.interned(name)?;
        match self.get_mut(parent) {
            Some(HeapObject::Table(table)) => table.remove(&key),
            _ => None,
        }
    }

    /// Resolve a dotted path such as `"game.Player"` from the namespace root
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut current = Value::Table(self.namespace());
        for segment in path.split('.') {
            current = match current {
                Value::Table(_) => self.field(current, segment)?,
                Value::Class(id) => Value::Closure(self.class(id)?.method(segment)?),
                _ => return None,
            };
        }
        Some(current)
    }
}
