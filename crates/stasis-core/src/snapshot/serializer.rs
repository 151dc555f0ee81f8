//! Graph serializer
//!
//! Every string, table, array and instance gets an index in its kind's
//! registry the first time it is seen. The index is reserved before the
//! object's contents are visited, so an object reached again through a
//! cycle or an alias resolves to the index it already has. Contents are
//! processed from an explicit work list rather than by recursion.

use super::graph::{ClassRecord, InstanceRecord, RawGraph};
use super::names::Classification;
use super::processed::ProcessedObject;
use super::registry::Registry;
use super::user_types::UserTypeTag;
use super::SnapshotContext;
use crate::error::{SnapshotError, SnapshotResult};
use crate::heap::{HostData, HostValue, ScriptRuntime};
use crate::value::{ObjectId, Value, ValueKind};
use tracing::{debug, trace};

type TableRecord = Vec<(ProcessedObject, ProcessedObject)>;

/// Flattens an object graph into a snapshot buffer
pub struct GraphSerializer<'a, R: ScriptRuntime + ?Sized> {
    ctx: &'a SnapshotContext,
    rt: &'a R,
    classes: Registry<ObjectId, ClassRecord>,
    closures: Registry<ObjectId, String>,
    strings: Registry<ObjectId, Vec<u8>>,
    arrays: Registry<ObjectId, Vec<ProcessedObject>>,
    tables: Registry<ObjectId, TableRecord>,
    instances: Registry<ObjectId, InstanceRecord>,
    pending: Vec<Value>,
}

impl<'a, R: ScriptRuntime + ?Sized> GraphSerializer<'a, R> {
    /// Create a serializer over a runtime
    pub fn new(ctx: &'a SnapshotContext, rt: &'a R) -> Self {
        Self {
            ctx,
            rt,
            classes: Registry::new(),
            closures: Registry::new(),
            strings: Registry::new(),
            arrays: Registry::new(),
            tables: Registry::new(),
            instances: Registry::new(),
            pending: Vec::new(),
        }
    }

    /// Register a value and everything reachable from it
    ///
    /// Adding the same object again returns the same [`ProcessedObject`].
    pub fn add_object(&mut self, value: Value) -> SnapshotResult<ProcessedObject> {
        let processed = self.register(value)?;
        while let Some(next) = self.pending.pop() {
            self.process(next)?;
        }
        Ok(processed)
    }

    /// Number of objects registered so far, across all sections
    pub fn object_count(&self) -> usize {
        self.classes.len()
            + self.closures.len()
            + self.strings.len()
            + self.arrays.len()
            + self.tables.len()
            + self.instances.len()
    }

    /// Serialize `root` and return the graph buffer
    pub fn serialize(mut self, root: Value) -> SnapshotResult<Vec<u8>> {
        let root = self.add_object(root)?;
        let graph = self.into_graph(root);
        debug!(
            classes = graph.classes.len(),
            closures = graph.closures.len(),
            strings = graph.strings.len(),
            arrays = graph.arrays.len(),
            tables = graph.tables.len(),
            instances = graph.instances.len(),
            "Serialized object graph"
        );
        Ok(graph.to_bytes())
    }

    /// Collect the registered records into a graph with the given root
    pub fn into_graph(self, root: ProcessedObject) -> RawGraph {
        RawGraph {
            classes: self.classes.into_values().collect(),
            closures: self.closures.into_values().collect(),
            strings: self.strings.into_values().collect(),
            arrays: self.arrays.into_values().collect(),
            tables: self.tables.into_values().collect(),
            instances: self.instances.into_values().collect(),
            root,
        }
    }

    /// Map a value to its [`ProcessedObject`], registering it if unseen
    ///
    /// Aggregates are queued for content processing; nothing here recurses.
    fn register(&mut self, value: Value) -> SnapshotResult<ProcessedObject> {
        let rt = self.rt;
        let kind = value.kind();

        let index = match value {
            Value::String(id) => match self.strings.index_of(&id) {
                Some(index) => index,
                None => {
                    let bytes = rt.string_bytes(id).ok_or_else(|| self.dangling(value))?;
                    self.check_limit(kind)?;
                    self.strings.insert_or_get(id, || bytes.to_vec()).0
                }
            },
            Value::Array(id) => match self.arrays.index_of(&id) {
                Some(index) => index,
                None => {
                    self.check_limit(kind)?;
                    self.pending.push(value);
                    self.arrays.insert_or_get(id, Vec::new).0
                }
            },
            Value::Table(id) => match self.tables.index_of(&id) {
                Some(index) => index,
                None => {
                    self.check_limit(kind)?;
                    self.pending.push(value);
                    self.tables.insert_or_get(id, Vec::new).0
                }
            },
            Value::Instance(id) => match self.instances.index_of(&id) {
                Some(index) => index,
                None => {
                    self.check_limit(kind)?;
                    self.pending.push(value);
                    self.instances
                        .insert_or_get(id, || InstanceRecord {
                            class: ProcessedObject::Null,
                            members: Vec::new(),
                            native: None,
                        })
                        .0
                }
            },
            Value::Class(id) => match self.classes.index_of(&id) {
                Some(index) => index,
                None => {
                    let name = self.static_name(value)?;
                    let members = rt.class_members(id).ok_or_else(|| self.dangling(value))?;
                    self.check_limit(kind)?;
                    trace!(name = %name, members = members.len(), "Registered class");
                    self.classes
                        .insert_or_get(id, || ClassRecord::new(name, members.to_vec()))
                        .0
                }
            },
            Value::Closure(id) => match self.closures.index_of(&id) {
                Some(index) => index,
                None => {
                    let name = self.static_name(value)?;
                    self.check_limit(kind)?;
                    trace!(name = %name, "Registered function");
                    self.closures.insert_or_get(id, || name).0
                }
            },
            Value::UserData(id) => {
                let host = rt.userdata(id).ok_or_else(|| self.dangling(value))?;
                return Ok(ProcessedObject::UserData(self.host_data(host)?));
            }
            Value::Null => return Ok(ProcessedObject::Null),
            Value::Bool(b) => return Ok(ProcessedObject::Bool(b)),
            Value::Integer(i) => return Ok(ProcessedObject::Integer(i)),
            Value::Float(f) => return Ok(ProcessedObject::Float(f)),
        };
        Ok(ProcessedObject::reference(kind, index))
    }

    fn static_name(&self, value: Value) -> SnapshotResult<String> {
        match self.ctx.names().classify(value) {
            Classification::StaticByName(name) => Ok(name.to_string()),
            Classification::DynamicContent => {
                Err(self.ctx.content_error(SnapshotError::UnsupportedValueKind {
                    kind: value.kind(),
                    reason: format!("{:?} has no static name", value),
                }))
            }
        }
    }

    /// Fill in the content record of a registered aggregate
    fn process(&mut self, value: Value) -> SnapshotResult<()> {
        let rt = self.rt;
        match value {
            Value::Array(id) => {
                let elements = rt.array_elements(id).ok_or_else(|| self.dangling(value))?;
                let record = elements
                    .iter()
                    .map(|e| self.register(*e))
                    .collect::<SnapshotResult<Vec<_>>>()?;
                if let Some(index) = self.arrays.index_of(&id) {
                    if let Some(slot) = self.arrays.get_mut(index) {
                        *slot = record;
                    }
                }
            }
            Value::Table(id) => {
                let entries = rt.table_entries(id).ok_or_else(|| self.dangling(value))?;
                let mut record = Vec::with_capacity(entries.len());
                for (key, val) in entries {
                    record.push((self.register(key)?, self.register(val)?));
                }
                if let Some(index) = self.tables.index_of(&id) {
                    if let Some(slot) = self.tables.get_mut(index) {
                        *slot = record;
                    }
                }
            }
            Value::Instance(id) => {
                let class = rt.instance_class(id).ok_or_else(|| self.dangling(value))?;
                let class = self.register(Value::Class(class))?;
                let members = rt
                    .instance_members(id)
                    .ok_or_else(|| self.dangling(value))?
                    .iter()
                    .map(|m| self.register(*m))
                    .collect::<SnapshotResult<Vec<_>>>()?;
                let native = match rt.instance_native(id) {
                    Some(host) => Some(self.host_data(host)?),
                    None => None,
                };
                if let Some(index) = self.instances.index_of(&id) {
                    if let Some(slot) = self.instances.get_mut(index) {
                        *slot = InstanceRecord {
                            class,
                            members,
                            native,
                        };
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn host_data(&self, host: &HostValue) -> SnapshotResult<HostData> {
        let tag = self.ctx.user_types().identify(self.rt, host.type_id);
        match tag {
            Some(tag) if tag == UserTypeTag::of(&host.data) => Ok(host.data.clone()),
            Some(tag) => Err(self.ctx.content_error(SnapshotError::UnsupportedValueKind {
                kind: ValueKind::UserData,
                reason: format!("payload does not match its {} binding", tag.binding_name()),
            })),
            None => Err(self.ctx.content_error(SnapshotError::UnsupportedValueKind {
                kind: ValueKind::UserData,
                reason: format!("host type {} is not a known binding", host.type_id.as_u32()),
            })),
        }
    }

    fn check_limit(&self, kind: ValueKind) -> SnapshotResult<()> {
        match self.ctx.options().max_objects {
            Some(limit) if self.object_count() >= limit => {
                Err(self.ctx.content_error(SnapshotError::UnsupportedValueKind {
                    kind,
                    reason: format!("graph exceeds the limit of {} objects", limit),
                }))
            }
            _ => Ok(()),
        }
    }

    fn dangling(&self, value: Value) -> SnapshotError {
        self.ctx.content_error(SnapshotError::UnsupportedValueKind {
            kind: value.kind(),
            reason: format!("{:?} does not refer to a live object", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeapError;
    use crate::heap::{Heap, NativeTypeId};

    /// Heap view that reports no member list for any instance
    struct MembersHidden(Heap);

    impl ScriptRuntime for MembersHidden {
        fn namespace(&self) -> ObjectId {
            self.0.namespace()
        }
        fn string_bytes(&self, id: ObjectId) -> Option<&[u8]> {
            self.0.string_bytes(id)
        }
        fn table_entries(&self, id: ObjectId) -> Option<Vec<(Value, Value)>> {
            self.0.table_entries(id)
        }
        fn array_elements(&self, id: ObjectId) -> Option<&[Value]> {
            self.0.array_elements(id)
        }
        fn instance_class(&self, id: ObjectId) -> Option<ObjectId> {
            self.0.instance_class(id)
        }
        fn instance_members(&self, _: ObjectId) -> Option<&[Value]> {
            None
        }
        fn instance_native(&self, id: ObjectId) -> Option<&HostValue> {
            self.0.instance_native(id)
        }
        fn userdata(&self, id: ObjectId) -> Option<&HostValue> {
            self.0.userdata(id)
        }
        fn class_members(&self, class: ObjectId) -> Option<&[String]> {
            self.0.class_members(class)
        }
        fn class_methods(&self, class: ObjectId) -> Option<Vec<(String, ObjectId)>> {
            self.0.class_methods(class)
        }
        fn class_host_type(&self, class: ObjectId) -> Option<NativeTypeId> {
            self.0.class_host_type(class)
        }
        fn alloc_string(&mut self, bytes: &[u8]) -> Result<ObjectId, HeapError> {
            self.0.alloc_string(bytes)
        }
        fn alloc_table(&mut self) -> Result<ObjectId, HeapError> {
            self.0.alloc_table()
        }
        fn alloc_array(&mut self, len: usize) -> Result<ObjectId, HeapError> {
            self.0.alloc_array(len)
        }
        fn alloc_instance(&mut self, class: ObjectId) -> Result<ObjectId, HeapError> {
            self.0.alloc_instance(class)
        }
        fn alloc_userdata(&mut self, value: HostValue) -> Result<ObjectId, HeapError> {
            self.0.alloc_userdata(value)
        }
        fn table_set(&mut self, table: ObjectId, key: Value, value: Value) -> Result<(), HeapError> {
            self.0.table_set(table, key, value)
        }
        fn array_set(&mut self, array: ObjectId, index: usize, value: Value) -> Result<(), HeapError> {
            self.0.array_set(array, index, value)
        }
        fn instance_set_member(
            &mut self,
            instance: ObjectId,
            slot: usize,
            value: Value,
        ) -> Result<(), HeapError> {
            self.0.instance_set_member(instance, slot, value)
        }
        fn instance_set_native(
            &mut self,
            instance: ObjectId,
            value: HostValue,
        ) -> Result<(), HeapError> {
            self.0.instance_set_native(instance, value)
        }
    }

    #[test]
    fn test_scalars_stay_inline() {
        let heap = Heap::new();
        let ctx = SnapshotContext::new(&heap);
        let mut ser = GraphSerializer::new(&ctx, &heap);

        assert_eq!(
            ser.add_object(Value::Float(0.5)).unwrap(),
            ProcessedObject::Float(0.5)
        );
        assert_eq!(ser.object_count(), 0);
    }

    #[test]
    fn test_add_object_is_idempotent() {
        let mut heap = Heap::new();
        let table = heap.new_table().unwrap();
        let ctx = SnapshotContext::new(&heap);
        let mut ser = GraphSerializer::new(&ctx, &heap);

        let first = ser.add_object(table).unwrap();
        let second = ser.add_object(table).unwrap();
        assert_eq!(first, second);
        assert_eq!(ser.object_count(), 1);
    }

    #[test]
    fn test_self_containing_array() {
        let mut heap = Heap::new();
        let arr = heap.new_array(vec![Value::Null]).unwrap();
        let id = arr.object_id().unwrap();
        heap.array_set(id, 0, arr).unwrap();

        let ctx = SnapshotContext::new(&heap);
        let mut ser = GraphSerializer::new(&ctx, &heap);
        let root = ser.add_object(arr).unwrap();
        let graph = ser.into_graph(root.clone());

        assert_eq!(graph.arrays, vec![vec![root]]);
    }

    #[test]
    fn test_registers_strings_once() {
        let mut heap = Heap::new();
        let s = heap.str("shared").unwrap();
        let arr = heap.new_array(vec![s, s, s]).unwrap();

        let ctx = SnapshotContext::new(&heap);
        let mut ser = GraphSerializer::new(&ctx, &heap);
        let root = ser.add_object(arr).unwrap();
        let graph = ser.into_graph(root);

        assert_eq!(graph.strings, vec![b"shared".to_vec()]);
        assert!(graph.arrays[0]
            .iter()
            .all(|e| *e == ProcessedObject::reference(ValueKind::String, 0)));
    }

    #[test]
    fn test_class_record_carries_member_names() {
        let mut heap = Heap::new();
        let root = heap.namespace();
        let player = heap.define_class(root, "Player", &["name", "hp"]).unwrap();
        let instance = heap.new_instance(player, &[]).unwrap();
        let ctx = SnapshotContext::new(&heap);
        let mut ser = GraphSerializer::new(&ctx, &heap);
        let root = ser.add_object(instance).unwrap();
        let graph = ser.into_graph(root);

        assert_eq!(
            graph.classes,
            vec![ClassRecord::new(
                "Player",
                vec!["name".to_string(), "hp".to_string()]
            )]
        );
        assert_eq!(graph.instances[0].members.len(), 2);
    }

    #[test]
    fn test_instance_without_members_is_rejected() {
        let mut heap = Heap::new();
        let root = heap.namespace();
        let player = heap.define_class(root, "Player", &["hp"]).unwrap();
        let instance = heap.new_instance(player, &[Value::Integer(3)]).unwrap();
        let rt = MembersHidden(heap);
        let ctx = SnapshotContext::new(&rt);

        let err = GraphSerializer::new(&ctx, &rt).serialize(instance).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnsupportedValueKind {
                kind: ValueKind::Instance,
                ..
            }
        ));
    }

    #[test]
    fn test_anonymous_closure_rejected() {
        let mut heap = Heap::new();
        let lambda = heap.new_closure("<lambda>", 1).unwrap();
        let ctx = SnapshotContext::new(&heap);

        let err = GraphSerializer::new(&ctx, &heap)
            .serialize(lambda)
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnsupportedValueKind {
                kind: ValueKind::Closure,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_host_type_rejected() {
        let mut heap = Heap::new();
        let value = heap
            .new_userdata(HostValue::new(NativeTypeId::new(77), HostData::Entity(1)))
            .unwrap();
        let ctx = SnapshotContext::new(&heap);

        let err = GraphSerializer::new(&ctx, &heap)
            .serialize(value)
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnsupportedValueKind {
                kind: ValueKind::UserData,
                ..
            }
        ));
    }

    #[test]
    #[should_panic(expected = "has no static name")]
    fn test_strict_mode_panics() {
        let mut heap = Heap::new();
        let lambda = heap.new_closure("<lambda>", 0).unwrap();
        let options = crate::config::SnapshotOptions {
            strict: true,
            ..Default::default()
        };
        let ctx = SnapshotContext::with_options(&heap, options);
        let _ = GraphSerializer::new(&ctx, &heap).serialize(lambda);
    }

    #[test]
    fn test_object_limit() {
        let mut heap = Heap::new();
        let a = heap.new_table().unwrap();
        let b = heap.new_table().unwrap();
        heap.set_field(a, "b", b).unwrap();
        let options = crate::config::SnapshotOptions {
            max_objects: Some(2),
            ..Default::default()
        };
        let ctx = SnapshotContext::with_options(&heap, options);

        // a, "b" and b make three objects
        let err = GraphSerializer::new(&ctx, &heap).serialize(a).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedValueKind { .. }));
    }
}
